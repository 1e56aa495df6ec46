//! Per-endpoint quality records.
//!
//! An [`EndpointRecord`] holds one [`Slot`] per check type. Each slot keeps the
//! latest parsed result together with the time it was observed and, for
//! periodic checks, the time it expires and should be re-probed.
//!
//! # Slot Semantics
//!
//! | State | Meaning |
//! |-------|---------|
//! | `None` | Never observed |
//! | `Some(Slot { value: Valid(_) })` | Latest observation parsed |
//! | `Some(Slot { value: Invalid { .. } })` | Latest observation was malformed |
//!
//! A newer observation overwrites the slot. An observation whose completion
//! timestamp is older than the slot's current one is discarded, so the record
//! converges to the same state regardless of the order in which a batch is
//! iterated or whether it is applied more than once.

use crate::{
    clock::add_duration,
    observation::{parse_block_number, parse_decimal_height, Observation, ObservationKind},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use tracing::trace;

/// Check types tracked per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Health,
    Status,
    CosmosStatus,
    ChainId,
    EvmChainId,
    BlockNumber,
    EpochInfo,
    Archival,
}

impl CheckKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Status => "status",
            Self::CosmosStatus => "cosmos_status",
            Self::ChainId => "chain_id",
            Self::EvmChainId => "evm_chain_id",
            Self::BlockNumber => "block_number",
            Self::EpochInfo => "epoch_info",
            Self::Archival => "archival",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed content of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum SlotValue<T> {
    Valid(T),
    /// The observation arrived but its content could not be parsed.
    Invalid { reason: String },
}

/// Latest result of one check type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot<T> {
    pub value: SlotValue<T>,
    pub observed_at: DateTime<Utc>,
    /// Set for periodic checks; once passed, the check is due again.
    pub expires_at: Option<DateTime<Utc>>,
}

impl<T> Slot<T> {
    fn new(
        value: Result<T, String>,
        observed_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let value = match value {
            Ok(v) => SlotValue::Valid(v),
            Err(reason) => SlotValue::Invalid { reason },
        };
        Self { value, observed_at, expires_at }
    }

    /// Returns the parsed value, or `None` for the invalid sentinel.
    #[must_use]
    pub fn valid(&self) -> Option<&T> {
        match &self.value {
            SlotValue::Valid(v) => Some(v),
            SlotValue::Invalid { .. } => None,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    fn meta(&self) -> SlotMeta {
        SlotMeta {
            observed_at: self.observed_at,
            expires_at: self.expires_at,
            valid: matches!(self.value, SlotValue::Valid(_)),
        }
    }
}

/// Type-erased view of a slot's timing, used by the check scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotMeta {
    pub observed_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub valid: bool,
}

impl SlotMeta {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// CometBFT node status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub chain_id: String,
    pub catching_up: bool,
    pub latest_block_height: u64,
}

/// Solana epoch position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EpochReport {
    pub epoch: u64,
    pub block_height: u64,
}

/// Archival contract balance observed at the archival block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivalSample {
    pub block: String,
    pub balance: String,
}

/// Time-windowed disqualification evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sanction {
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// Mutable quality record of one endpoint.
///
/// Only [`EndpointStore`](crate::store::EndpointStore) mutates records;
/// everything else works on clones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointRecord {
    health: Option<Slot<bool>>,
    status: Option<Slot<StatusReport>>,
    cosmos_status: Option<Slot<u64>>,
    chain_id: Option<Slot<String>>,
    evm_chain_id: Option<Slot<String>>,
    block_number: Option<Slot<u64>>,
    epoch_info: Option<Slot<EpochReport>>,
    archival: Option<Slot<ArchivalSample>>,
    empty_response: Option<Sanction>,
    invalid_response: Option<Sanction>,
}

impl EndpointRecord {
    #[must_use]
    pub fn health(&self) -> Option<&Slot<bool>> {
        self.health.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> Option<&Slot<StatusReport>> {
        self.status.as_ref()
    }

    #[must_use]
    pub fn cosmos_status(&self) -> Option<&Slot<u64>> {
        self.cosmos_status.as_ref()
    }

    #[must_use]
    pub fn chain_id(&self) -> Option<&Slot<String>> {
        self.chain_id.as_ref()
    }

    #[must_use]
    pub fn evm_chain_id(&self) -> Option<&Slot<String>> {
        self.evm_chain_id.as_ref()
    }

    #[must_use]
    pub fn block_number(&self) -> Option<&Slot<u64>> {
        self.block_number.as_ref()
    }

    #[must_use]
    pub fn epoch_info(&self) -> Option<&Slot<EpochReport>> {
        self.epoch_info.as_ref()
    }

    #[must_use]
    pub fn archival(&self) -> Option<&Slot<ArchivalSample>> {
        self.archival.as_ref()
    }

    /// Most recent empty response, regardless of age.
    #[must_use]
    pub fn empty_response(&self) -> Option<&Sanction> {
        self.empty_response.as_ref()
    }

    /// Most recent invalid response, regardless of age.
    #[must_use]
    pub fn invalid_response(&self) -> Option<&Sanction> {
        self.invalid_response.as_ref()
    }

    /// Returns timing metadata for the slot backing `check`.
    #[must_use]
    pub fn slot_meta(&self, check: CheckKind) -> Option<SlotMeta> {
        match check {
            CheckKind::Health => self.health.as_ref().map(Slot::meta),
            CheckKind::Status => self.status.as_ref().map(Slot::meta),
            CheckKind::CosmosStatus => self.cosmos_status.as_ref().map(Slot::meta),
            CheckKind::ChainId => self.chain_id.as_ref().map(Slot::meta),
            CheckKind::EvmChainId => self.evm_chain_id.as_ref().map(Slot::meta),
            CheckKind::BlockNumber => self.block_number.as_ref().map(Slot::meta),
            CheckKind::EpochInfo => self.epoch_info.as_ref().map(Slot::meta),
            CheckKind::Archival => self.archival.as_ref().map(Slot::meta),
        }
    }

    /// Writes one observation into the matching slot.
    ///
    /// `ttl` sets the slot expiry for periodic checks. Archival balances are
    /// only recorded when observed at `archival_block`.
    ///
    /// Returns `true` if the record changed.
    pub(crate) fn apply(
        &mut self,
        observation: &Observation,
        ttl: Option<Duration>,
        archival_block: Option<&str>,
    ) -> bool {
        let at = observation.completed_at;
        let expires_at = ttl.map(|ttl| add_duration(at, ttl));

        let changed = match &observation.kind {
            ObservationKind::Health { healthy } => {
                overwrite(&mut self.health, Slot::new(Ok(*healthy), at, expires_at))
            }
            ObservationKind::Status { chain_id, catching_up, latest_block_height } => {
                let parsed = parse_status(chain_id, *catching_up, latest_block_height);
                overwrite(&mut self.status, Slot::new(parsed, at, expires_at))
            }
            ObservationKind::CosmosStatus { height } => {
                overwrite(&mut self.cosmos_status, Slot::new(parse_decimal_height(height), at, expires_at))
            }
            ObservationKind::ChainId { chain_id } => {
                overwrite(&mut self.chain_id, Slot::new(parse_chain_id(chain_id), at, expires_at))
            }
            ObservationKind::EvmChainId { chain_id } => {
                overwrite(&mut self.evm_chain_id, Slot::new(parse_chain_id(chain_id), at, expires_at))
            }
            ObservationKind::BlockNumber { block_number } => {
                overwrite(&mut self.block_number, Slot::new(parse_block_number(block_number), at, expires_at))
            }
            ObservationKind::EpochInfo { epoch, block_height } => {
                let parsed = parse_epoch(*epoch, *block_height);
                overwrite(&mut self.epoch_info, Slot::new(parsed, at, expires_at))
            }
            ObservationKind::ArchivalBalance { block, balance } => {
                let Some(target) = archival_block else {
                    return false;
                };
                if !block.eq_ignore_ascii_case(target) {
                    return false;
                }
                let parsed = if balance.trim().is_empty() {
                    Err("empty archival balance".to_string())
                } else {
                    Ok(ArchivalSample { block: target.to_string(), balance: balance.clone() })
                };
                overwrite(&mut self.archival, Slot::new(parsed, at, expires_at))
            }
            ObservationKind::Empty => update_sanction(
                &mut self.empty_response,
                Sanction { at, reason: "empty response".to_string() },
            ),
            ObservationKind::InvalidResponse { reason } => update_sanction(
                &mut self.invalid_response,
                Sanction { at, reason: reason.clone() },
            ),
            ObservationKind::Unrecognized { .. } => false,
        };

        if changed {
            trace!(
                endpoint = %observation.endpoint,
                kind = observation.kind.as_str(),
                "endpoint record updated"
            );
        }

        changed
    }
}

fn overwrite<T: PartialEq>(slot: &mut Option<Slot<T>>, new: Slot<T>) -> bool {
    match slot {
        Some(current) if current.observed_at > new.observed_at => false,
        Some(current) if *current == new => false,
        _ => {
            *slot = Some(new);
            true
        }
    }
}

fn update_sanction(slot: &mut Option<Sanction>, new: Sanction) -> bool {
    match slot {
        Some(current) if current.at > new.at => false,
        Some(current) if *current == new => false,
        _ => {
            *slot = Some(new);
            true
        }
    }
}

fn parse_chain_id(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err("empty chain id".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

fn parse_status(
    chain_id: &str,
    catching_up: bool,
    latest_block_height: &str,
) -> Result<StatusReport, String> {
    let chain_id = parse_chain_id(chain_id)?;
    let latest_block_height = parse_decimal_height(latest_block_height)?;
    Ok(StatusReport { chain_id, catching_up, latest_block_height })
}

fn parse_epoch(epoch: u64, block_height: u64) -> Result<EpochReport, String> {
    if block_height == 0 {
        return Err("epoch info block height is zero".to_string());
    }
    if epoch == 0 {
        return Err("epoch info epoch is zero".to_string());
    }
    Ok(EpochReport { epoch, block_height })
}
