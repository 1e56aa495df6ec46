//! Per-service QoS facade.
//!
//! [`QosService`] ties together one [`EndpointStore`], one
//! [`ServiceStateEstimator`] and one family [`Validator`]. The
//! [`ServiceQos`] trait erases the family so services of different chain
//! types can live side by side in a [`QosRegistry`](crate::registry::QosRegistry).
//!
//! # Lock Order
//!
//! Store, then estimator. Applying a batch reads the archival block from the
//! estimator snapshot without locking, applies the batch under the store write
//! lock, releases it, then updates the estimator from the cloned records.

use crate::{
    clock::Clock,
    endpoint::EndpointRecord,
    errors::{QosError, SelectionError},
    estimator::{PerceivedChainState, ServiceStateEstimator},
    metrics::QosMetrics,
    observation::ObservationBatch,
    scheduler::{required_checks, CheckRequest},
    selector::{Evaluation, Selection, SelectionOutcome, SelectionReport, Selector},
    store::EndpointStore,
    types::{ChainFamily, EndpointAddr, ServiceId},
    validation::{DisqualificationCategory, ValidationError, Validator},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// What applying one observation batch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub observations: usize,
    pub changed_endpoints: usize,
    pub perceived_block_height: u64,
    pub height_raised: bool,
}

/// An endpoint currently excluded from selection and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisqualifiedEndpoint {
    pub endpoint: EndpointAddr,
    pub category: DisqualificationCategory,
    pub reason: ValidationError,
}

/// Every stored endpoint failing validation, with counts by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisqualifiedEndpointsReport {
    pub total_endpoints: usize,
    pub valid_endpoints: usize,
    pub disqualified: Vec<DisqualifiedEndpoint>,
    pub empty_response_count: usize,
    pub chain_id_check_errors_count: usize,
    pub block_number_check_errors_count: usize,
    pub other_count: usize,
}

impl DisqualifiedEndpointsReport {
    fn push(&mut self, endpoint: EndpointAddr, reason: ValidationError) {
        let category = reason.category();
        match category {
            DisqualificationCategory::EmptyResponse => self.empty_response_count += 1,
            DisqualificationCategory::ChainId => self.chain_id_check_errors_count += 1,
            DisqualificationCategory::BlockNumber => self.block_number_check_errors_count += 1,
            DisqualificationCategory::Other => self.other_count += 1,
        }
        self.disqualified.push(DisqualifiedEndpoint { endpoint, category, reason });
    }
}

/// Family-erased QoS operations of one service.
pub trait ServiceQos: Send + Sync {
    fn service_id(&self) -> &ServiceId;

    fn family(&self) -> ChainFamily;

    /// Applies a batch to the store and folds the changes into the estimator.
    ///
    /// # Errors
    ///
    /// Returns [`QosError::ServiceMismatch`] if the batch belongs to another service.
    fn apply_observations(&self, batch: &ObservationBatch) -> Result<ApplySummary, QosError>;

    /// Picks one valid endpoint, or a random candidate if none is valid.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::EmptyCandidateList`] if `candidates` is empty.
    fn select(&self, candidates: &[EndpointAddr]) -> Result<EndpointAddr, SelectionError>;

    /// Picks up to `n` distinct endpoints, preferring distinct domains.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::EmptyCandidateList`] if `candidates` is empty.
    fn select_multiple(
        &self,
        candidates: &[EndpointAddr],
        n: usize,
    ) -> Result<Vec<EndpointAddr>, SelectionError>;

    /// Picks one endpoint and reports every candidate's validation outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::EmptyCandidateList`] if `candidates` is empty.
    fn select_with_metadata(
        &self,
        candidates: &[EndpointAddr],
    ) -> Result<SelectionReport, SelectionError>;

    /// Synthetic checks currently due for `endpoint`.
    fn required_checks(&self, endpoint: &EndpointAddr) -> Vec<CheckRequest>;

    fn perceived_state(&self) -> Arc<PerceivedChainState>;

    fn disqualified_endpoints(&self) -> DisqualifiedEndpointsReport;

    /// Clone of the stored record for `endpoint`.
    fn endpoint_record(&self, endpoint: &str) -> Option<EndpointRecord>;

    /// Clears the perceived chain state.
    fn reset_perceived_state(&self);
}

/// QoS engine of one service, generic over its chain family.
pub struct QosService<V: Validator> {
    service_id: ServiceId,
    validator: V,
    store: EndpointStore,
    estimator: ServiceStateEstimator,
    metrics: Arc<dyn QosMetrics>,
    clock: Arc<dyn Clock>,
}

impl<V: Validator> QosService<V> {
    #[must_use]
    pub fn new(
        service_id: ServiceId,
        validator: V,
        metrics: Arc<dyn QosMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let estimator = ServiceStateEstimator::new(
            service_id.clone(),
            validator.expected_chain_id().map(str::to_string),
            validator.archival_config().cloned(),
        );

        Self {
            store: EndpointStore::new(service_id.clone()),
            service_id,
            validator,
            estimator,
            metrics,
            clock,
        }
    }

    #[must_use]
    pub fn validator(&self) -> &V {
        &self.validator
    }

    #[must_use]
    pub fn store(&self) -> &EndpointStore {
        &self.store
    }

    /// Evaluates candidates against the current snapshot and picks `n`.
    fn run_selection(
        &self,
        candidates: &[EndpointAddr],
        n: usize,
    ) -> Result<(Evaluation, Selection), SelectionError> {
        let perceived = self.estimator.snapshot();
        let selector =
            Selector::new(&self.service_id, &self.store, &self.validator, &perceived, self.clock.now());

        let evaluation = selector.evaluate(candidates)?;
        for reason in evaluation.failures() {
            self.metrics.record_validation_failure(&self.service_id, reason);
        }

        let selection = selector.pick(&evaluation, n);
        self.metrics.record_selection(&self.service_id, selection.outcome, selection.endpoints.len());

        Ok((evaluation, selection))
    }
}

impl<V: Validator> ServiceQos for QosService<V> {
    fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    fn family(&self) -> ChainFamily {
        self.validator.family()
    }

    fn apply_observations(&self, batch: &ObservationBatch) -> Result<ApplySummary, QosError> {
        if batch.service_id != self.service_id {
            return Err(QosError::ServiceMismatch {
                expected: self.service_id.clone(),
                actual: batch.service_id.clone(),
            });
        }

        let now = self.clock.now();
        let archival_block = self.estimator.snapshot().archival_block().map(str::to_string);

        // Store -> Estimator: the store stays read-locked until the estimate is folded in.
        let (changed, update) = self.store.apply_observations_with(
            &self.validator,
            &batch.observations,
            archival_block.as_deref(),
            |changed| self.estimator.update_from_changed_endpoints(&self.validator, changed, now),
        );

        self.metrics.record_observations(&self.service_id, batch.len(), changed.len());
        if update.height_raised() {
            self.metrics.record_perceived_height(&self.service_id, update.block_height);
        }

        debug!(
            service_id = %self.service_id,
            observations = batch.len(),
            changed = changed.len(),
            contributors = update.contributors,
            block_height = update.block_height,
            "observation batch applied"
        );

        Ok(ApplySummary {
            observations: batch.len(),
            changed_endpoints: changed.len(),
            perceived_block_height: update.block_height,
            height_raised: update.height_raised(),
        })
    }

    fn select(&self, candidates: &[EndpointAddr]) -> Result<EndpointAddr, SelectionError> {
        let (_, selection) = self.run_selection(candidates, 1)?;
        selection.endpoints.into_iter().next().ok_or(SelectionError::EmptyCandidateList)
    }

    fn select_multiple(
        &self,
        candidates: &[EndpointAddr],
        n: usize,
    ) -> Result<Vec<EndpointAddr>, SelectionError> {
        let (_, selection) = self.run_selection(candidates, n.max(1))?;
        Ok(selection.endpoints)
    }

    fn select_with_metadata(
        &self,
        candidates: &[EndpointAddr],
    ) -> Result<SelectionReport, SelectionError> {
        let (evaluation, selection) = self.run_selection(candidates, 1)?;
        let random_fallback = selection.outcome == SelectionOutcome::RandomFallback;
        let selected =
            selection.endpoints.into_iter().next().ok_or(SelectionError::EmptyCandidateList)?;
        let valid_count = evaluation.valid().len();

        Ok(SelectionReport { selected, results: evaluation.results, valid_count, random_fallback })
    }

    fn required_checks(&self, endpoint: &EndpointAddr) -> Vec<CheckRequest> {
        let perceived = self.estimator.snapshot();
        let now = self.clock.now();
        let record = self.store.get(endpoint.as_str());

        required_checks(&self.validator, &self.service_id, endpoint, record.as_ref(), &perceived, now)
    }

    fn perceived_state(&self) -> Arc<PerceivedChainState> {
        self.estimator.snapshot()
    }

    fn disqualified_endpoints(&self) -> DisqualifiedEndpointsReport {
        let perceived = self.estimator.snapshot();
        let now = self.clock.now();

        let mut report = self.store.with_records(|records| {
            let mut report = DisqualifiedEndpointsReport {
                total_endpoints: records.len(),
                ..DisqualifiedEndpointsReport::default()
            };
            for (endpoint, record) in records {
                match self.validator.validate(record, &perceived, now) {
                    Ok(()) => report.valid_endpoints += 1,
                    Err(reason) => report.push(endpoint.clone(), reason),
                }
            }
            report
        });

        report.disqualified.sort_unstable_by(|a, b| a.endpoint.cmp(&b.endpoint));
        report
    }

    fn endpoint_record(&self, endpoint: &str) -> Option<EndpointRecord> {
        self.store.get(endpoint)
    }

    fn reset_perceived_state(&self) {
        self.estimator.reset();
    }
}

impl<V: Validator> std::fmt::Debug for QosService<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QosService")
            .field("service_id", &self.service_id)
            .field("family", &self.validator.family())
            .field("endpoints", &self.store.len())
            .finish_non_exhaustive()
    }
}
