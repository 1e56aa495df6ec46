use crate::endpoint::CheckKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Reason an endpoint is currently excluded from the valid set.
///
/// Validation failures are never fatal: they only remove the endpoint from
/// selection and are aggregated for observability.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ValidationError {
    /// The check has never produced an observation for this endpoint.
    #[error("endpoint has no {check} observation")]
    NoObservation { check: CheckKind },

    /// The latest observation for the check could not be parsed.
    #[error("endpoint returned a malformed {check} response: {detail}")]
    MalformedObservation { check: CheckKind, detail: String },

    #[error("endpoint reported unhealthy")]
    Unhealthy,

    #[error("{check} {observed} does not match expected {expected}")]
    WrongChainId { check: CheckKind, expected: String, observed: String },

    #[error("endpoint is catching up")]
    CatchingUp,

    #[error(
        "{check} height {height} is outside the sync allowance: min allowed {min_allowed} (perceived {perceived}, allowance {sync_allowance})"
    )]
    OutsideSyncAllowance {
        check: CheckKind,
        height: u64,
        min_allowed: u64,
        perceived: u64,
        sync_allowance: u64,
    },

    #[error("endpoint epoch {epoch} is behind perceived epoch {perceived}")]
    EpochBehind { epoch: u64, perceived: u64 },

    #[error("endpoint returned an invalid response at {at}: {detail}")]
    RecentInvalidResponse { at: DateTime<Utc>, detail: String },

    #[error("endpoint returned an empty response at {at}")]
    EmptyResponseHistory { at: DateTime<Utc> },

    #[error("archival balance {observed} does not match expected {expected}")]
    ArchivalMismatch { expected: String, observed: String },
}

/// Coarse grouping of validation failures for disqualification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisqualificationCategory {
    EmptyResponse,
    ChainId,
    BlockNumber,
    Other,
}

impl ValidationError {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoObservation { .. } => "no_observation",
            Self::MalformedObservation { .. } => "malformed_observation",
            Self::Unhealthy => "unhealthy",
            Self::WrongChainId { .. } => "wrong_chain_id",
            Self::CatchingUp => "catching_up",
            Self::OutsideSyncAllowance { .. } => "outside_sync_allowance",
            Self::EpochBehind { .. } => "epoch_behind",
            Self::RecentInvalidResponse { .. } => "recent_invalid_response",
            Self::EmptyResponseHistory { .. } => "empty_response_history",
            Self::ArchivalMismatch { .. } => "archival_mismatch",
        }
    }

    /// Check type the failure is attributed to, when there is one.
    #[must_use]
    pub fn check(&self) -> Option<CheckKind> {
        match self {
            Self::NoObservation { check } |
            Self::MalformedObservation { check, .. } |
            Self::WrongChainId { check, .. } |
            Self::OutsideSyncAllowance { check, .. } => Some(*check),
            Self::Unhealthy => Some(CheckKind::Health),
            Self::CatchingUp => Some(CheckKind::Status),
            Self::EpochBehind { .. } => Some(CheckKind::EpochInfo),
            Self::ArchivalMismatch { .. } => Some(CheckKind::Archival),
            Self::RecentInvalidResponse { .. } | Self::EmptyResponseHistory { .. } => None,
        }
    }

    #[must_use]
    pub fn category(&self) -> DisqualificationCategory {
        match self {
            Self::EmptyResponseHistory { .. } => DisqualificationCategory::EmptyResponse,
            Self::WrongChainId { .. } => DisqualificationCategory::ChainId,
            Self::OutsideSyncAllowance { .. } | Self::EpochBehind { .. } => {
                DisqualificationCategory::BlockNumber
            }
            Self::NoObservation { check } | Self::MalformedObservation { check, .. } => {
                match check {
                    CheckKind::ChainId | CheckKind::EvmChainId => DisqualificationCategory::ChainId,
                    CheckKind::BlockNumber |
                    CheckKind::Status |
                    CheckKind::CosmosStatus |
                    CheckKind::EpochInfo => DisqualificationCategory::BlockNumber,
                    CheckKind::Health | CheckKind::Archival => DisqualificationCategory::Other,
                }
            }
            Self::Unhealthy |
            Self::CatchingUp |
            Self::RecentInvalidResponse { .. } |
            Self::ArchivalMismatch { .. } => DisqualificationCategory::Other,
        }
    }
}
