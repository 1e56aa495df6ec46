//! Per-service endpoint record store.

use crate::{
    endpoint::EndpointRecord,
    observation::Observation,
    types::{EndpointAddr, ServiceId},
    validation::ObservationApplier,
};
use parking_lot::{RwLock, RwLockWriteGuard};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Endpoints changed by one batch, with a clone of their updated record.
pub type ChangedEndpoints = HashMap<EndpointAddr, EndpointRecord>;

/// Internal record map.
pub type RecordMap = HashMap<EndpointAddr, EndpointRecord, ahash::RandomState>;

/// Mutable quality records of every endpoint a service has observed.
///
/// Records are created on the first accepted observation and never removed.
/// A batch is applied inside a single write-lock critical section, so readers
/// never see a partially applied batch. Batches are serialized together with
/// whatever the caller derives from their changes.
#[derive(Debug)]
pub struct EndpointStore {
    service_id: ServiceId,
    records: RwLock<RecordMap>,
}

impl EndpointStore {
    #[must_use]
    pub fn new(service_id: ServiceId) -> Self {
        Self { service_id, records: RwLock::new(RecordMap::default()) }
    }

    /// Applies `observations` in order and returns the endpoints that changed.
    ///
    /// Observations the family does not track are ignored and never create a
    /// record. `archival_block` is the current archival target; balances for
    /// any other block are dropped.
    pub fn apply_observations<A: ObservationApplier + ?Sized>(
        &self,
        applier: &A,
        observations: &[Observation],
        archival_block: Option<&str>,
    ) -> ChangedEndpoints {
        self.apply_observations_with(applier, observations, archival_block, |_| ()).0
    }

    /// Applies `observations` and runs `then` on the changed endpoints before
    /// any other writer can touch the store.
    ///
    /// The write lock is downgraded to a read lock for `then`, so concurrent
    /// readers proceed while later batches wait. An endpoint counts as changed
    /// only if its record differs from its state before the batch.
    pub fn apply_observations_with<A, R>(
        &self,
        applier: &A,
        observations: &[Observation],
        archival_block: Option<&str>,
        then: impl FnOnce(&ChangedEndpoints) -> R,
    ) -> (ChangedEndpoints, R)
    where
        A: ObservationApplier + ?Sized,
    {
        let mut before: HashMap<&EndpointAddr, EndpointRecord> = HashMap::new();
        let mut touched = HashSet::new();
        let mut ignored = 0usize;

        let mut records = self.records.write();
        for observation in observations {
            if !applier.accepts(&observation.kind) {
                ignored += 1;
                continue;
            }

            let ttl = observation.kind.check_kind().map(|check| applier.check_ttl(check));
            let record = records.entry(observation.endpoint.clone()).or_default();
            before.entry(&observation.endpoint).or_insert_with(|| record.clone());
            if record.apply(observation, ttl, archival_block) {
                touched.insert(&observation.endpoint);
            }
        }

        let updated: ChangedEndpoints = touched
            .into_iter()
            .filter_map(|addr| {
                let record = records.get(addr)?;
                (before.get(addr) != Some(record)).then(|| (addr.clone(), record.clone()))
            })
            .collect();

        let records = RwLockWriteGuard::downgrade(records);
        let result = then(&updated);
        drop(records);

        debug!(
            service_id = %self.service_id,
            observations = observations.len(),
            ignored,
            changed = updated.len(),
            "observations applied"
        );

        (updated, result)
    }

    /// Returns a clone of the record for `endpoint`.
    #[must_use]
    pub fn get(&self, endpoint: &str) -> Option<EndpointRecord> {
        self.records.read().get(endpoint).cloned()
    }

    #[must_use]
    pub fn contains(&self, endpoint: &str) -> bool {
        self.records.read().contains_key(endpoint)
    }

    /// Runs `f` with shared access to every record.
    pub fn with_records<R>(&self, f: impl FnOnce(&RecordMap) -> R) -> R {
        f(&self.records.read())
    }

    /// All stored endpoint addresses, sorted.
    #[must_use]
    pub fn endpoints(&self) -> Vec<EndpointAddr> {
        let mut endpoints: Vec<EndpointAddr> = self.records.read().keys().cloned().collect();
        endpoints.sort_unstable();
        endpoints
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
