//! Identifier types shared by every QoS component.
//!
//! Both identifiers wrap an `Arc<str>` so that cloning an address into a
//! changed-set, a selection result or a metrics label never reallocates.

use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt, sync::Arc};

/// Opaque identifier of a chain/service instance.
///
/// Scopes exactly one endpoint store and one perceived chain state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(Arc<str>);

impl ServiceId {
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for ServiceId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl AsRef<str> for ServiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique endpoint identity, conventionally `"<node-identity>-<url>"`.
///
/// The engine treats it as an opaque key. Only the TLD extractor looks inside
/// it, to find an embedded URL for diversity-aware selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointAddr(Arc<str>);

impl EndpointAddr {
    #[must_use]
    pub fn new(addr: impl Into<Arc<str>>) -> Self {
        Self(addr.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointAddr {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for EndpointAddr {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl AsRef<str> for EndpointAddr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EndpointAddr {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Chain-protocol family a service belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
    /// EVM JSON-RPC chains (`eth_chainId`, `eth_blockNumber`).
    Evm,
    /// CometBFT RPC (`/health`, `/status`).
    CometBft,
    /// Cosmos SDK chains exposing any mix of CometBFT RPC, REST and EVM JSON-RPC.
    Cosmos,
    /// Solana JSON-RPC (`getHealth`, `getEpochInfo`).
    Solana,
}

impl ChainFamily {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evm => "evm",
            Self::CometBft => "comet_bft",
            Self::Cosmos => "cosmos",
            Self::Solana => "solana",
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
