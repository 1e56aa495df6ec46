//! Observation records produced by response interpreters.
//!
//! An [`Observation`] describes one endpoint's behavior on one response or
//! synthetic check. Interpreters that decode relay responses live outside this
//! crate and hand over the already-decoded tagged union; numeric fields are kept
//! in their raw string form so that parsing failures are recorded as invalid
//! slot values instead of being dropped on the floor.
//!
//! # Wire Shape
//!
//! Observations serialize as flat JSON objects tagged by `kind`:
//!
//! ```json
//! {"endpoint":"node-1-https://rpc.example.com","completed_at":"2024-05-01T12:00:00Z",
//!  "kind":"block_number","block_number":"0x12a05f2"}
//! ```

mod parse;

pub use parse::{parse_block_number, parse_decimal_height};

use crate::{
    endpoint::CheckKind,
    types::{EndpointAddr, ServiceId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One endpoint's behavior on one request or check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Endpoint that produced the response.
    pub endpoint: EndpointAddr,
    /// When the response was received.
    pub completed_at: DateTime<Utc>,
    /// The decoded response variant.
    #[serde(flatten)]
    pub kind: ObservationKind,
}

impl Observation {
    #[must_use]
    pub fn new(
        endpoint: impl Into<EndpointAddr>,
        completed_at: DateTime<Utc>,
        kind: ObservationKind,
    ) -> Self {
        Self { endpoint: endpoint.into(), completed_at, kind }
    }
}

/// Decoded response variants, one per response kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObservationKind {
    /// Liveness probe result (CometBFT `/health`, Solana `getHealth`).
    Health { healthy: bool },
    /// CometBFT `/status` node info.
    Status { chain_id: String, catching_up: bool, latest_block_height: String },
    /// Cosmos SDK REST `/cosmos/base/node/v1beta1/status` height.
    CosmosStatus { height: String },
    /// EVM `eth_chainId` result.
    ChainId { chain_id: String },
    /// `eth_chainId` result from the EVM module of a Cosmos chain.
    EvmChainId { chain_id: String },
    /// EVM `eth_blockNumber` result.
    BlockNumber { block_number: String },
    /// Solana `getEpochInfo` result.
    EpochInfo { epoch: u64, block_height: u64 },
    /// `eth_getBalance` of the archival contract at `block`.
    ArchivalBalance { block: String, balance: String },
    /// The endpoint returned an empty payload.
    Empty,
    /// The endpoint returned a payload that failed to unmarshal or validate.
    InvalidResponse { reason: String },
    /// A response to a method the QoS layer does not track.
    Unrecognized { method: String },
}

impl ObservationKind {
    /// Returns the check slot this variant writes to, if any.
    ///
    /// Sanction variants and unrecognized responses have no check slot.
    #[must_use]
    pub fn check_kind(&self) -> Option<CheckKind> {
        match self {
            Self::Health { .. } => Some(CheckKind::Health),
            Self::Status { .. } => Some(CheckKind::Status),
            Self::CosmosStatus { .. } => Some(CheckKind::CosmosStatus),
            Self::ChainId { .. } => Some(CheckKind::ChainId),
            Self::EvmChainId { .. } => Some(CheckKind::EvmChainId),
            Self::BlockNumber { .. } => Some(CheckKind::BlockNumber),
            Self::EpochInfo { .. } => Some(CheckKind::EpochInfo),
            Self::ArchivalBalance { .. } => Some(CheckKind::Archival),
            Self::Empty | Self::InvalidResponse { .. } | Self::Unrecognized { .. } => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Health { .. } => "health",
            Self::Status { .. } => "status",
            Self::CosmosStatus { .. } => "cosmos_status",
            Self::ChainId { .. } => "chain_id",
            Self::EvmChainId { .. } => "evm_chain_id",
            Self::BlockNumber { .. } => "block_number",
            Self::EpochInfo { .. } => "epoch_info",
            Self::ArchivalBalance { .. } => "archival_balance",
            Self::Empty => "empty",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// Observations gathered while serving one request for one service.
///
/// Holds more than one record when retries hit several endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationBatch {
    pub service_id: ServiceId,
    pub observations: Vec<Observation>,
}

impl ObservationBatch {
    #[must_use]
    pub fn new(service_id: impl Into<ServiceId>, observations: Vec<Observation>) -> Self {
        Self { service_id: service_id.into(), observations }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
