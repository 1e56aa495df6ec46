//! Perceived chain state estimation.
//!
//! The [`ServiceStateEstimator`] folds the heights reported by changed
//! endpoints into a per-service [`PerceivedChainState`]: the highest block
//! height (and Solana epoch) seen from endpoints that pass identity checks,
//! plus the archival target for EVM services with archival checks.
//!
//! # Thread Safety
//!
//! Readers take a lock-free snapshot through `ArcSwap`. Writers serialize on a
//! mutex that also guards the archival balance votes, then publish a new
//! snapshot. The perceived height never decreases except through
//! [`ServiceStateEstimator::reset`].

mod archival;

pub use archival::{ArchivalTarget, ARCHIVAL_CONSENSUS_THRESHOLD};

use crate::{
    config::ArchivalCheckConfig,
    endpoint::{EndpointRecord, Slot},
    store::ChangedEndpoints,
    types::{EndpointAddr, ServiceId},
    validation::Validator,
};
use arc_swap::ArcSwap;
use archival::{choose_archival_block, log_consensus, BalanceVotes};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Service-wide view of the chain derived from endpoint reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PerceivedChainState {
    /// Configured chain id, for reporting. Not derived from observations.
    pub chain_id: Option<String>,
    /// Highest block height reported by an endpoint passing identity checks.
    pub block_height: u64,
    /// Highest Solana epoch; always zero for other families.
    pub epoch: u64,
    pub archival: Option<ArchivalTarget>,
}

impl PerceivedChainState {
    #[must_use]
    pub fn archival_block(&self) -> Option<&str> {
        self.archival.as_ref().map(|a| a.block_hex.as_str())
    }

    #[must_use]
    pub fn expected_balance(&self) -> Option<&str> {
        self.archival.as_ref().and_then(|a| a.expected_balance.as_deref())
    }
}

/// What one estimator update did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EstimatorUpdate {
    /// Endpoints whose reported height was considered.
    pub contributors: usize,
    /// Endpoints skipped for failing identity checks or reporting no height.
    pub skipped: usize,
    pub previous_height: u64,
    pub block_height: u64,
    pub epoch: u64,
    pub archival_block_chosen: bool,
    pub expected_balance_fixed: bool,
}

impl EstimatorUpdate {
    #[must_use]
    pub fn height_raised(&self) -> bool {
        self.block_height > self.previous_height
    }
}

/// Maintains the [`PerceivedChainState`] of one service.
pub struct ServiceStateEstimator {
    service_id: ServiceId,
    archival_config: Option<ArchivalCheckConfig>,
    state: ArcSwap<PerceivedChainState>,
    votes: Mutex<BalanceVotes>,
}

impl ServiceStateEstimator {
    #[must_use]
    pub fn new(
        service_id: ServiceId,
        chain_id: Option<String>,
        archival_config: Option<ArchivalCheckConfig>,
    ) -> Self {
        let initial = PerceivedChainState { chain_id, ..PerceivedChainState::default() };
        Self {
            service_id,
            archival_config,
            state: ArcSwap::from_pointee(initial),
            votes: Mutex::new(BalanceVotes::default()),
        }
    }

    /// Returns the current perceived state without locking.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<PerceivedChainState> {
        self.state.load_full()
    }

    /// Current perceived block height.
    #[inline]
    #[must_use]
    pub fn block_height(&self) -> u64 {
        self.state.load().block_height
    }

    /// Folds the changed endpoints into the perceived state.
    ///
    /// Endpoints failing [`Validator::validate_identity`] are skipped so a
    /// misconfigured or sanctioned node cannot drag the perceived height. The
    /// sync allowance is not applied here.
    pub fn update_from_changed_endpoints<V: Validator + ?Sized>(
        &self,
        validator: &V,
        changed: &ChangedEndpoints,
        now: DateTime<Utc>,
    ) -> EstimatorUpdate {
        let mut votes = self.votes.lock();
        let current = self.state.load_full();
        let mut next = (*current).clone();

        let mut update =
            EstimatorUpdate { previous_height: current.block_height, ..EstimatorUpdate::default() };

        // Sorted so archival consensus does not depend on map iteration order.
        let mut endpoints: Vec<(&EndpointAddr, &EndpointRecord)> = changed.iter().collect();
        endpoints.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let mut trusted = Vec::with_capacity(endpoints.len());
        for (endpoint, record) in endpoints {
            if let Err(reason) = validator.validate_identity(record, now) {
                debug!(
                    service_id = %self.service_id,
                    endpoint = %endpoint,
                    reason = %reason,
                    "endpoint skipped for chain state estimation"
                );
                update.skipped += 1;
                continue;
            }

            trusted.push((endpoint, record));

            let Some(contribution) = validator.contribution(record) else {
                update.skipped += 1;
                continue;
            };
            update.contributors += 1;

            next.block_height = next.block_height.max(contribution.block_height);
            if let Some(epoch) = contribution.epoch {
                next.epoch = next.epoch.max(epoch);
            }
        }

        if let Some(config) = &self.archival_config {
            self.update_archival(config, &mut next, &mut votes, &trusted, &mut update);
        }

        update.block_height = next.block_height;
        update.epoch = next.epoch;

        if update.height_raised() {
            debug!(
                service_id = %self.service_id,
                previous = update.previous_height,
                block_height = next.block_height,
                epoch = next.epoch,
                "perceived block height raised"
            );
        }

        if next != *current {
            self.state.store(Arc::new(next));
        }

        update
    }

    fn update_archival(
        &self,
        config: &ArchivalCheckConfig,
        next: &mut PerceivedChainState,
        votes: &mut BalanceVotes,
        trusted: &[(&EndpointAddr, &EndpointRecord)],
        update: &mut EstimatorUpdate,
    ) {
        if next.archival.is_none() && next.block_height > 0 {
            let block = choose_archival_block(config, next.block_height, &mut rand::rng());
            let target = ArchivalTarget::new(block);
            info!(
                service_id = %self.service_id,
                archival_block = %target.block_hex,
                perceived = next.block_height,
                "archival block chosen"
            );
            next.archival = Some(target);
            votes.clear();
            update.archival_block_chosen = true;
        }

        let Some(target) = next.archival.as_mut() else {
            return;
        };
        if target.expected_balance.is_some() {
            return;
        }

        for (endpoint, record) in trusted {
            let Some(sample) = record.archival().and_then(Slot::valid) else {
                continue;
            };
            if sample.block != target.block_hex {
                continue;
            }

            if let Some(balance) = votes.record(endpoint, &sample.balance) {
                target.expected_balance = Some(balance);
                votes.clear();
                update.expected_balance_fixed = true;
                log_consensus(config, target);
                return;
            }
        }

        debug!(
            service_id = %self.service_id,
            archival_block = %target.block_hex,
            votes = votes.len(),
            "archival balance consensus pending"
        );
    }

    /// Clears the perceived height, epoch and archival target.
    ///
    /// The only way the perceived height can go down.
    pub fn reset(&self) {
        let mut votes = self.votes.lock();
        let chain_id = self.state.load().chain_id.clone();
        self.state.store(Arc::new(PerceivedChainState { chain_id, ..PerceivedChainState::default() }));
        votes.clear();
        info!(service_id = %self.service_id, "perceived chain state reset");
    }
}

impl std::fmt::Debug for ServiceStateEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceStateEstimator")
            .field("service_id", &self.service_id)
            .field("state", &self.state.load())
            .finish_non_exhaustive()
    }
}
