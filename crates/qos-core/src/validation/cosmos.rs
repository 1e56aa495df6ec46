use super::{
    check_chain_id, check_sanctions, check_sync_allowance,
    cometbft::{validate_comet_identity, HEALTH_REQUEST_ID, STATUS_REQUEST_ID},
    require, HeightContribution, ObservationApplier, ValidationError, Validator,
};
use crate::{
    config::{ApiKind, ValidatorSettings},
    endpoint::{CheckKind, EndpointRecord, Slot},
    estimator::PerceivedChainState,
    scheduler::CheckPayload,
    types::ChainFamily,
};
use chrono::{DateTime, Utc};
use std::time::Duration;

const EVM_CHAIN_ID_REQUEST_ID: u64 = 2003;
const NODE_STATUS_PATH: &str = "/cosmos/base/node/v1beta1/status";

/// Validates Cosmos SDK endpoints.
///
/// Which checks apply depends on the APIs the chain exposes:
///
/// | API | Checks |
/// |-----|--------|
/// | CometBFT RPC | `health`, `status` (chain id, catching up, height) |
/// | REST | `/cosmos/base/node/v1beta1/status` (height) |
/// | JSON-RPC | `eth_chainId` against the configured EVM chain id |
#[derive(Debug, Clone)]
pub struct CosmosValidator {
    chain_id: String,
    evm_chain_id: Option<String>,
    settings: ValidatorSettings,
    comet: bool,
    rest: bool,
    checks: Vec<CheckKind>,
}

impl CosmosValidator {
    #[must_use]
    pub fn new(
        chain_id: impl Into<String>,
        evm_chain_id: Option<String>,
        supported_apis: &[ApiKind],
        settings: ValidatorSettings,
    ) -> Self {
        let comet = supported_apis.contains(&ApiKind::CometBft);
        let rest = supported_apis.contains(&ApiKind::Rest);
        // JSON-RPC is only probed when there is a chain id to compare against.
        let evm_chain_id = evm_chain_id.filter(|_| supported_apis.contains(&ApiKind::JsonRpc));

        let mut checks = Vec::new();
        if comet {
            checks.extend([CheckKind::Health, CheckKind::Status]);
        }
        if rest {
            checks.push(CheckKind::CosmosStatus);
        }
        if evm_chain_id.is_some() {
            checks.push(CheckKind::EvmChainId);
        }

        Self { chain_id: chain_id.into(), evm_chain_id, settings, comet, rest, checks }
    }
}

impl ObservationApplier for CosmosValidator {
    fn checks(&self) -> &[CheckKind] {
        &self.checks
    }

    fn check_ttl(&self, check: CheckKind) -> Duration {
        self.settings.intervals.ttl(check)
    }
}

impl Validator for CosmosValidator {
    fn family(&self) -> ChainFamily {
        ChainFamily::Cosmos
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

        if self.comet {
            validate_comet_identity(record, &self.chain_id)?;
        }

        if let Some(expected) = &self.evm_chain_id {
            let observed = require(record.evm_chain_id(), CheckKind::EvmChainId)?;
            check_chain_id(CheckKind::EvmChainId, observed, expected)?;
        }

        Ok(())
    }

    fn validate(
        &self,
        record: &EndpointRecord,
        perceived: &PerceivedChainState,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        self.validate_identity(record, now)?;

        let sync_allowance = self.settings.sync_allowance;
        if self.comet {
            let status = require(record.status(), CheckKind::Status)?;
            check_sync_allowance(
                CheckKind::Status,
                status.latest_block_height,
                perceived.block_height,
                sync_allowance,
            )?;
        }

        if self.rest {
            let height = *require(record.cosmos_status(), CheckKind::CosmosStatus)?;
            check_sync_allowance(
                CheckKind::CosmosStatus,
                height,
                perceived.block_height,
                sync_allowance,
            )?;
        }

        Ok(())
    }

    fn contribution(&self, record: &EndpointRecord) -> Option<HeightContribution> {
        let comet = if self.comet {
            record.status().and_then(Slot::valid).map(|s| s.latest_block_height)
        } else {
            None
        };
        let rest = if self.rest { record.cosmos_status().and_then(Slot::valid).copied() } else { None };

        comet
            .max(rest)
            .map(|block_height| HeightContribution { block_height, epoch: None })
    }

    fn check_payload(
        &self,
        check: CheckKind,
        _perceived: &PerceivedChainState,
    ) -> Option<CheckPayload> {
        match check {
            CheckKind::Health if self.comet => {
                Some(CheckPayload::json_rpc(HEALTH_REQUEST_ID, "health"))
            }
            CheckKind::Status if self.comet => {
                Some(CheckPayload::json_rpc(STATUS_REQUEST_ID, "status"))
            }
            CheckKind::CosmosStatus if self.rest => Some(CheckPayload::rest(NODE_STATUS_PATH)),
            CheckKind::EvmChainId if self.evm_chain_id.is_some() => {
                Some(CheckPayload::json_rpc(EVM_CHAIN_ID_REQUEST_ID, "eth_chainId"))
            }
            _ => None,
        }
    }
}
