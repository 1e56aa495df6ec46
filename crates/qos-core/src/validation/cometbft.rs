use super::{
    check_chain_id, check_health, check_sanctions, check_sync_allowance, require,
    HeightContribution, ObservationApplier, ValidationError, Validator,
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

pub(crate) const HEALTH_REQUEST_ID: u64 = 2001;
pub(crate) const STATUS_REQUEST_ID: u64 = 2002;

const CHECKS: [CheckKind; 2] = [CheckKind::Health, CheckKind::Status];

/// Validates CometBFT endpoints via the `health` and `status` RPC methods.
#[derive(Debug, Clone)]
pub struct CometBftValidator {
    chain_id: String,
    settings: ValidatorSettings,
}

impl CometBftValidator {
    #[must_use]
    pub fn new(chain_id: impl Into<String>, settings: ValidatorSettings) -> Self {
        Self { chain_id: chain_id.into(), settings }
    }
}

/// Health, status chain id and catching-up checks shared with Cosmos chains.
pub(crate) fn validate_comet_identity(
    record: &EndpointRecord,
    chain_id: &str,
) -> Result<(), ValidationError> {
    check_health(record)?;

    let status = require(record.status(), CheckKind::Status)?;
    check_chain_id(CheckKind::Status, &status.chain_id, chain_id)?;

    if status.catching_up {
        return Err(ValidationError::CatchingUp);
    }

    Ok(())
}

impl ObservationApplier for CometBftValidator {
    fn checks(&self) -> &[CheckKind] {
        &CHECKS
    }

    fn check_ttl(&self, check: CheckKind) -> Duration {
        self.settings.intervals.ttl(check)
    }
}

impl Validator for CometBftValidator {
    fn family(&self) -> ChainFamily {
        ChainFamily::CometBft
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
        validate_comet_identity(record, &self.chain_id)
    }

    fn validate(
        &self,
        record: &EndpointRecord,
        perceived: &PerceivedChainState,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        self.validate_identity(record, now)?;

        let status = require(record.status(), CheckKind::Status)?;
        check_sync_allowance(
            CheckKind::Status,
            status.latest_block_height,
            perceived.block_height,
            self.settings.sync_allowance,
        )
    }

    fn contribution(&self, record: &EndpointRecord) -> Option<HeightContribution> {
        record.status().and_then(Slot::valid).map(|status| HeightContribution {
            block_height: status.latest_block_height,
            epoch: None,
        })
    }

    fn check_payload(
        &self,
        check: CheckKind,
        _perceived: &PerceivedChainState,
    ) -> Option<CheckPayload> {
        match check {
            CheckKind::Health => Some(CheckPayload::json_rpc(HEALTH_REQUEST_ID, "health")),
            CheckKind::Status => Some(CheckPayload::json_rpc(STATUS_REQUEST_ID, "status")),
            _ => None,
        }
    }
}
