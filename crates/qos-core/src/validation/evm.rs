use super::{
    check_chain_id, check_sanctions, check_sync_allowance, require, HeightContribution,
    ObservationApplier, ValidationError, Validator,
};
use crate::{
    config::{ArchivalCheckConfig, ValidatorSettings},
    endpoint::{CheckKind, EndpointRecord, Slot},
    estimator::PerceivedChainState,
    scheduler::CheckPayload,
    types::ChainFamily,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::time::Duration;

const CHAIN_ID_REQUEST_ID: u64 = 1001;
const BLOCK_NUMBER_REQUEST_ID: u64 = 1002;
const ARCHIVAL_REQUEST_ID: u64 = 1003;

/// Validates EVM endpoints via `eth_chainId`, `eth_blockNumber` and, when
/// configured, an archival `eth_getBalance` probe.
#[derive(Debug, Clone)]
pub struct EvmValidator {
    chain_id: String,
    archival: Option<ArchivalCheckConfig>,
    settings: ValidatorSettings,
    checks: Vec<CheckKind>,
}

impl EvmValidator {
    #[must_use]
    pub fn new(
        chain_id: impl Into<String>,
        archival: Option<ArchivalCheckConfig>,
        settings: ValidatorSettings,
    ) -> Self {
        let mut checks = vec![CheckKind::ChainId, CheckKind::BlockNumber];
        if archival.is_some() {
            checks.push(CheckKind::Archival);
        }

        Self { chain_id: chain_id.into(), archival, settings, checks }
    }

    fn check_archival(
        record: &EndpointRecord,
        perceived: &PerceivedChainState,
    ) -> Result<(), ValidationError> {
        // No consensus yet: nothing to compare against.
        let Some(expected) = perceived.expected_balance() else {
            return Ok(());
        };

        let sample = require(record.archival(), CheckKind::Archival)?;
        // A sample taken at a previous archival block says nothing about this one.
        if perceived.archival_block() != Some(sample.block.as_str()) {
            return Err(ValidationError::NoObservation { check: CheckKind::Archival });
        }
        if sample.balance.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(ValidationError::ArchivalMismatch {
                expected: expected.to_string(),
                observed: sample.balance.clone(),
            })
        }
    }
}

impl ObservationApplier for EvmValidator {
    fn checks(&self) -> &[CheckKind] {
        &self.checks
    }

    fn check_ttl(&self, check: CheckKind) -> Duration {
        self.settings.intervals.ttl(check)
    }
}

impl Validator for EvmValidator {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    fn expected_chain_id(&self) -> Option<&str> {
        Some(&self.chain_id)
    }

    fn validate_identity(
        &self,
        record: &EndpointRecord,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        check_sanctions(record, now, self.settings.sanction_timeout)?;

        let observed = require(record.chain_id(), CheckKind::ChainId)?;
        check_chain_id(CheckKind::ChainId, observed, &self.chain_id)
    }

    fn validate(
        &self,
        record: &EndpointRecord,
        perceived: &PerceivedChainState,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        self.validate_identity(record, now)?;

        let height = *require(record.block_number(), CheckKind::BlockNumber)?;
        check_sync_allowance(
            CheckKind::BlockNumber,
            height,
            perceived.block_height,
            self.settings.sync_allowance,
        )?;

        if self.archival.is_some() {
            Self::check_archival(record, perceived)?;
        }

        Ok(())
    }

    fn contribution(&self, record: &EndpointRecord) -> Option<HeightContribution> {
        record
            .block_number()
            .and_then(Slot::valid)
            .map(|height| HeightContribution { block_height: *height, epoch: None })
    }

    fn check_payload(
        &self,
        check: CheckKind,
        perceived: &PerceivedChainState,
    ) -> Option<CheckPayload> {
        match check {
            CheckKind::ChainId => Some(CheckPayload::json_rpc(CHAIN_ID_REQUEST_ID, "eth_chainId")),
            CheckKind::BlockNumber => {
                Some(CheckPayload::json_rpc(BLOCK_NUMBER_REQUEST_ID, "eth_blockNumber"))
            }
            CheckKind::Archival => {
                let archival = self.archival.as_ref()?;
                let block = perceived.archival_block()?;
                Some(CheckPayload::json_rpc_with_params(
                    ARCHIVAL_REQUEST_ID,
                    "eth_getBalance",
                    json!([archival.contract_address, block]),
                ))
            }
            _ => None,
        }
    }

    fn archival_config(&self) -> Option<&ArchivalCheckConfig> {
        self.archival.as_ref()
    }
}
