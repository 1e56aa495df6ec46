//! Archival block selection and expected-balance consensus.

use crate::{config::ArchivalCheckConfig, types::EndpointAddr};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

/// Matching balance reports needed before the expected balance is fixed.
pub const ARCHIVAL_CONSENSUS_THRESHOLD: usize = 5;

/// Historical block archival endpoints are probed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivalTarget {
    pub block: u64,
    /// Lowercase `0x`-prefixed hex of `block`, as sent in `eth_getBalance`.
    pub block_hex: String,
    /// Set once [`ARCHIVAL_CONSENSUS_THRESHOLD`] endpoints agree.
    pub expected_balance: Option<String>,
}

impl ArchivalTarget {
    #[must_use]
    pub fn new(block: u64) -> Self {
        Self { block, block_hex: format!("0x{block:x}"), expected_balance: None }
    }

    #[must_use]
    pub fn with_expected_balance(mut self, balance: impl Into<String>) -> Self {
        self.expected_balance = Some(balance.into());
        self
    }
}

/// Picks a block in `[contract_start_block, perceived - threshold]`.
///
/// Falls back to block 1 when the chain is shorter than the threshold and to
/// the contract start block when the range is empty.
pub(crate) fn choose_archival_block<R: Rng>(
    config: &ArchivalCheckConfig,
    perceived: u64,
    rng: &mut R,
) -> u64 {
    if perceived <= config.threshold {
        return 1;
    }

    let max_block = perceived - config.threshold;
    if max_block < config.contract_start_block {
        return config.contract_start_block;
    }

    rng.random_range(config.contract_start_block..=max_block)
}

/// Per-endpoint balance votes for the current archival block.
#[derive(Debug, Default)]
pub(crate) struct BalanceVotes {
    votes: HashMap<EndpointAddr, String, ahash::RandomState>,
}

impl BalanceVotes {
    /// Records `endpoint`'s latest balance and returns it if it now has consensus.
    pub(crate) fn record(&mut self, endpoint: &EndpointAddr, balance: &str) -> Option<String> {
        let balance = balance.to_ascii_lowercase();
        self.votes.insert(endpoint.clone(), balance.clone());

        let matching = self.votes.values().filter(|b| **b == balance).count();
        (matching >= ARCHIVAL_CONSENSUS_THRESHOLD).then_some(balance)
    }

    pub(crate) fn clear(&mut self) {
        self.votes.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.votes.len()
    }
}

pub(crate) fn log_consensus(config: &ArchivalCheckConfig, target: &ArchivalTarget) {
    info!(
        archival_block = %target.block_hex,
        contract_address = %config.contract_address,
        expected_balance = target.expected_balance.as_deref().unwrap_or_default(),
        "expected archival balance fixed"
    );
}
