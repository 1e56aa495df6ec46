use super::{
    check_health, check_sanctions, check_sync_allowance, require, HeightContribution,
    ObservationApplier, ValidationError, Validator,
};
use crate::{
    config::ValidatorSettings,
    endpoint::{CheckKind, EndpointRecord, Slot},
    estimator::PerceivedChainState,
    scheduler::CheckPayload,
    types::ChainFamily,
};
use chrono::{DateTime, Utc};
use std::time::Duration;

const HEALTH_REQUEST_ID: u64 = 3001;
const EPOCH_INFO_REQUEST_ID: u64 = 3002;

const CHECKS: [CheckKind; 2] = [CheckKind::Health, CheckKind::EpochInfo];

/// Validates Solana endpoints via `getHealth` and `getEpochInfo`.
///
/// Solana endpoints report no chain id, so identity is liveness only.
#[derive(Debug, Clone)]
pub struct SolanaValidator {
    settings: ValidatorSettings,
}

impl SolanaValidator {
    #[must_use]
    pub fn new(settings: ValidatorSettings) -> Self {
        Self { settings }
    }
}

impl ObservationApplier for SolanaValidator {
    fn checks(&self) -> &[CheckKind] {
        &CHECKS
    }

    fn check_ttl(&self, check: CheckKind) -> Duration {
        self.settings.intervals.ttl(check)
    }
}

impl Validator for SolanaValidator {
    fn family(&self) -> ChainFamily {
        ChainFamily::Solana
    }

    fn settings(&self) -> &ValidatorSettings {
        &self.settings
    }

    fn expected_chain_id(&self) -> Option<&str> {
        None
    }

    fn validate_identity(
        &self,
        record: &EndpointRecord,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        check_sanctions(record, now, self.settings.sanction_timeout)?;
        check_health(record)
    }

    fn validate(
        &self,
        record: &EndpointRecord,
        perceived: &PerceivedChainState,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        self.validate_identity(record, now)?;

        let info = require(record.epoch_info(), CheckKind::EpochInfo)?;
        if info.epoch < perceived.epoch {
            return Err(ValidationError::EpochBehind { epoch: info.epoch, perceived: perceived.epoch });
        }

        check_sync_allowance(
            CheckKind::EpochInfo,
            info.block_height,
            perceived.block_height,
            self.settings.sync_allowance,
        )
    }

    fn contribution(&self, record: &EndpointRecord) -> Option<HeightContribution> {
        record.epoch_info().and_then(Slot::valid).map(|info| HeightContribution {
            block_height: info.block_height,
            epoch: Some(info.epoch),
        })
    }

    fn check_payload(
        &self,
        check: CheckKind,
        _perceived: &PerceivedChainState,
    ) -> Option<CheckPayload> {
        match check {
            CheckKind::Health => Some(CheckPayload::json_rpc(HEALTH_REQUEST_ID, "getHealth")),
            CheckKind::EpochInfo => {
                Some(CheckPayload::json_rpc(EPOCH_INFO_REQUEST_ID, "getEpochInfo"))
            }
            _ => None,
        }
    }
}
