use crate::types::ServiceId;
use thiserror::Error;

/// Errors surfaced to request-handling callers by selection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
    /// The candidate list was empty, so there is nothing to fall back to.
    #[error("candidate endpoint list is empty")]
    EmptyCandidateList,
}

impl SelectionError {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyCandidateList => "empty_candidate_list",
        }
    }
}

/// Errors returned by the QoS service facade and registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QosError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("observation batch for service {actual} applied to service {expected}")]
    ServiceMismatch { expected: ServiceId, actual: ServiceId },

    #[error("no QoS service registered for {0}")]
    UnknownService(ServiceId),

    #[error("service {0} is configured more than once")]
    DuplicateService(ServiceId),

    #[error("invalid service configuration: {0}")]
    InvalidConfig(String),
}

impl QosError {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selection(e) => e.as_str(),
            Self::ServiceMismatch { .. } => "service_mismatch",
            Self::UnknownService(_) => "unknown_service",
            Self::DuplicateService(_) => "duplicate_service",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}
