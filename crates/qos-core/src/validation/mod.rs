//! Per-family endpoint validation.
//!
//! Each chain-protocol family implements two capabilities:
//!
//! - [`ObservationApplier`]: which observation variants the family tracks and
//!   how long each periodic check result stays fresh.
//! - [`Validator`]: whether an [`EndpointRecord`] is currently usable given the
//!   perceived chain state.
//!
//! The store, estimator and selector are generic over these traits and never
//! branch on the chain type themselves.
//!
//! # Check Order
//!
//! Checks run in a fixed order; the first failure is the reported reason:
//!
//! 1. Sanctions (empty response, then invalid response, within the sanction timeout)
//! 2. Liveness (health)
//! 3. Identity (chain id, EVM chain id)
//! 4. Sync status (catching up)
//! 5. Freshness (block height against perceived height minus sync allowance)
//! 6. Archival balance (EVM with archival checks enabled)
//!
//! A check without any observation fails with
//! [`ValidationError::NoObservation`]; it never passes implicitly.

mod cometbft;
mod cosmos;
mod errors;
mod evm;
mod solana;

pub use cometbft::CometBftValidator;
pub use cosmos::CosmosValidator;
pub use errors::{DisqualificationCategory, ValidationError};
pub use evm::EvmValidator;
pub use solana::SolanaValidator;

use crate::{
    clock::within_window,
    config::{ArchivalCheckConfig, ValidatorSettings},
    endpoint::{CheckKind, EndpointRecord, Slot, SlotValue},
    estimator::PerceivedChainState,
    observation::ObservationKind,
    scheduler::CheckPayload,
    types::ChainFamily,
};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Decides which observations a family records and their freshness window.
pub trait ObservationApplier: Send + Sync {
    /// Check types this family tracks, in probing order.
    fn checks(&self) -> &[CheckKind];

    /// How long a result of `check` stays fresh before it is due again.
    fn check_ttl(&self, check: CheckKind) -> Duration;

    /// Returns true if `kind` should be written to an endpoint record.
    ///
    /// Check variants are accepted only for the family's own checks.
    /// Sanction variants are always accepted; unrecognized responses never are.
    fn accepts(&self, kind: &ObservationKind) -> bool {
        match kind.check_kind() {
            Some(check) => self.checks().contains(&check),
            None => matches!(kind, ObservationKind::Empty | ObservationKind::InvalidResponse { .. }),
        }
    }
}

/// Height reported by an endpoint that may raise the perceived chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightContribution {
    pub block_height: u64,
    pub epoch: Option<u64>,
}

/// Family-specific endpoint validation.
///
/// Validation is a pure function of the record, the perceived state and the
/// current time. It performs no I/O and is safe to call under a read lock.
pub trait Validator: ObservationApplier + 'static {
    fn family(&self) -> ChainFamily;

    fn settings(&self) -> &ValidatorSettings;

    /// The chain id endpoints must report, if the family verifies one.
    fn expected_chain_id(&self) -> Option<&str>;

    /// Runs sanction, liveness, identity and sync-status checks only.
    ///
    /// An endpoint failing these never influences the perceived chain state.
    /// Freshness is not checked here.
    fn validate_identity(
        &self,
        record: &EndpointRecord,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError>;

    /// Runs every applicable check against `perceived`.
    fn validate(
        &self,
        record: &EndpointRecord,
        perceived: &PerceivedChainState,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError>;

    /// Height this endpoint reports, if it has a parsed one.
    fn contribution(&self, record: &EndpointRecord) -> Option<HeightContribution>;

    /// Builds the synthetic request for `check`.
    ///
    /// Returns `None` when the check cannot be issued yet, e.g. the archival
    /// check before an archival block has been chosen.
    fn check_payload(
        &self,
        check: CheckKind,
        perceived: &PerceivedChainState,
    ) -> Option<CheckPayload>;

    /// Archival verification settings, for families that support it.
    fn archival_config(&self) -> Option<&ArchivalCheckConfig> {
        None
    }
}

/// Fails if the endpoint returned an empty or invalid response within `timeout`.
pub(crate) fn check_sanctions(
    record: &EndpointRecord,
    now: DateTime<Utc>,
    timeout: Duration,
) -> Result<(), ValidationError> {
    if let Some(empty) = record.empty_response() {
        if within_window(empty.at, now, timeout) {
            return Err(ValidationError::EmptyResponseHistory { at: empty.at });
        }
    }

    if let Some(invalid) = record.invalid_response() {
        if within_window(invalid.at, now, timeout) {
            return Err(ValidationError::RecentInvalidResponse {
                at: invalid.at,
                detail: invalid.reason.clone(),
            });
        }
    }

    Ok(())
}

/// Returns the parsed slot value or the matching missing/malformed error.
pub(crate) fn require<T>(slot: Option<&Slot<T>>, check: CheckKind) -> Result<&T, ValidationError> {
    match slot.map(|s| &s.value) {
        None => Err(ValidationError::NoObservation { check }),
        Some(SlotValue::Invalid { reason }) => {
            Err(ValidationError::MalformedObservation { check, detail: reason.clone() })
        }
        Some(SlotValue::Valid(value)) => Ok(value),
    }
}

pub(crate) fn check_health(record: &EndpointRecord) -> Result<(), ValidationError> {
    if *require(record.health(), CheckKind::Health)? {
        Ok(())
    } else {
        Err(ValidationError::Unhealthy)
    }
}

pub(crate) fn check_chain_id(
    check: CheckKind,
    observed: &str,
    expected: &str,
) -> Result<(), ValidationError> {
    if observed == expected {
        Ok(())
    } else {
        Err(ValidationError::WrongChainId {
            check,
            expected: expected.to_string(),
            observed: observed.to_string(),
        })
    }
}

/// Fails if `height` is below `perceived - sync_allowance`.
pub(crate) fn check_sync_allowance(
    check: CheckKind,
    height: u64,
    perceived: u64,
    sync_allowance: u64,
) -> Result<(), ValidationError> {
    let min_allowed = perceived.saturating_sub(sync_allowance);
    if height < min_allowed {
        return Err(ValidationError::OutsideSyncAllowance {
            check,
            height,
            min_allowed,
            perceived,
            sync_allowance,
        });
    }
    Ok(())
}
