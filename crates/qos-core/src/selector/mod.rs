//! Endpoint selection over the current valid set.
//!
//! # Selection Flow
//!
//! ```text
//! candidates ──► dedupe ──► store lookup ──► validate ──► valid set
//!                                                            │
//!                                   ┌────────────────────────┴──────────┐
//!                                   ▼ non-empty                         ▼ empty
//!                           random / TLD-diverse               random over candidates
//!                                                              (degraded mode, warned)
//! ```
//!
//! Selection never fails for a non-empty candidate list: when nothing
//! validates, a random candidate is still returned so the request can be
//! attempted.

mod diversity;
mod tld;

pub use tld::extract_tld;

use crate::{
    errors::SelectionError,
    estimator::PerceivedChainState,
    metrics::MetricLabel,
    store::EndpointStore,
    types::{EndpointAddr, ServiceId},
    validation::{ValidationError, Validator},
};
use chrono::{DateTime, Utc};
use diversity::{select_diverse, select_random};
use rand::seq::IndexedRandom;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Whether a selection came from the valid set or the degraded fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionOutcome {
    Valid,
    /// No candidate was valid; picked at random from all candidates.
    RandomFallback,
}

impl MetricLabel for SelectionOutcome {
    fn as_metric_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::RandomFallback => "random_fallback",
        }
    }
}

/// Validation outcome of one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Valid,
    /// The store has no record for the endpoint.
    NotFound,
    Invalid(ValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointValidationResult {
    pub endpoint: EndpointAddr,
    #[serde(flatten)]
    pub outcome: CandidateOutcome,
}

/// Selected endpoint together with why every candidate did or did not qualify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionReport {
    pub selected: EndpointAddr,
    pub results: Vec<EndpointValidationResult>,
    pub valid_count: usize,
    pub random_fallback: bool,
}

/// Endpoints picked by one selection call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub endpoints: Vec<EndpointAddr>,
    pub outcome: SelectionOutcome,
}

/// Per-candidate validation results in candidate order, duplicates removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub results: Vec<EndpointValidationResult>,
}

impl Evaluation {
    #[must_use]
    pub fn candidates(&self) -> Vec<EndpointAddr> {
        self.results.iter().map(|r| r.endpoint.clone()).collect()
    }

    #[must_use]
    pub fn valid(&self) -> Vec<EndpointAddr> {
        self.results
            .iter()
            .filter(|r| r.outcome == CandidateOutcome::Valid)
            .map(|r| r.endpoint.clone())
            .collect()
    }

    /// Validation failures, for metrics.
    pub fn failures(&self) -> impl Iterator<Item = &ValidationError> {
        self.results.iter().filter_map(|r| match &r.outcome {
            CandidateOutcome::Invalid(reason) => Some(reason),
            _ => None,
        })
    }
}

/// Selects endpoints for one service against a fixed perceived state.
///
/// Borrowed views only; build one per selection call.
pub struct Selector<'a, V: ?Sized> {
    service_id: &'a ServiceId,
    store: &'a EndpointStore,
    validator: &'a V,
    perceived: &'a PerceivedChainState,
    now: DateTime<Utc>,
}

impl<'a, V: Validator + ?Sized> Selector<'a, V> {
    #[must_use]
    pub fn new(
        service_id: &'a ServiceId,
        store: &'a EndpointStore,
        validator: &'a V,
        perceived: &'a PerceivedChainState,
        now: DateTime<Utc>,
    ) -> Self {
        Self { service_id, store, validator, perceived, now }
    }

    /// Validates every distinct candidate under one store read lock.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::EmptyCandidateList`] if `candidates` is empty.
    pub fn evaluate(&self, candidates: &[EndpointAddr]) -> Result<Evaluation, SelectionError> {
        if candidates.is_empty() {
            return Err(SelectionError::EmptyCandidateList);
        }

        let mut seen = HashSet::with_capacity(candidates.len());
        let distinct: Vec<&EndpointAddr> = candidates.iter().filter(|c| seen.insert(*c)).collect();

        let results: Vec<EndpointValidationResult> = self.store.with_records(|records| {
            distinct
                .into_iter()
                .map(|endpoint| {
                    let outcome = match records.get(endpoint) {
                        None => CandidateOutcome::NotFound,
                        Some(record) => {
                            match self.validator.validate(record, self.perceived, self.now) {
                                Ok(()) => CandidateOutcome::Valid,
                                Err(reason) => CandidateOutcome::Invalid(reason),
                            }
                        }
                    };
                    EndpointValidationResult { endpoint: endpoint.clone(), outcome }
                })
                .collect()
        });

        Ok(Evaluation { results })
    }

    /// Picks one endpoint uniformly from the valid candidates.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::EmptyCandidateList`] if `candidates` is empty.
    pub fn select(&self, candidates: &[EndpointAddr]) -> Result<Selection, SelectionError> {
        let evaluation = self.evaluate(candidates)?;
        Ok(self.pick(&evaluation, 1))
    }

    /// Picks up to `n` distinct endpoints, spreading them across domains.
    ///
    /// `n == 0` is treated as 1.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::EmptyCandidateList`] if `candidates` is empty.
    pub fn select_multiple(
        &self,
        candidates: &[EndpointAddr],
        n: usize,
    ) -> Result<Selection, SelectionError> {
        let evaluation = self.evaluate(candidates)?;
        Ok(self.pick(&evaluation, n.max(1)))
    }

    /// Picks one endpoint and reports the outcome for every candidate.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::EmptyCandidateList`] if `candidates` is empty.
    pub fn select_with_metadata(
        &self,
        candidates: &[EndpointAddr],
    ) -> Result<SelectionReport, SelectionError> {
        let evaluation = self.evaluate(candidates)?;
        let selection = self.pick(&evaluation, 1);
        let selected =
            selection.endpoints.into_iter().next().ok_or(SelectionError::EmptyCandidateList)?;

        let valid_count =
            evaluation.results.iter().filter(|r| r.outcome == CandidateOutcome::Valid).count();

        Ok(SelectionReport {
            selected,
            results: evaluation.results,
            valid_count,
            random_fallback: selection.outcome == SelectionOutcome::RandomFallback,
        })
    }

    /// Picks from an evaluation. Returns at least one endpoint when the
    /// evaluation is non-empty.
    pub fn pick(&self, evaluation: &Evaluation, n: usize) -> Selection {
        let mut rng = rand::rng();
        let valid = evaluation.valid();

        if valid.is_empty() {
            let candidates = evaluation.candidates();
            warn!(
                service_id = %self.service_id,
                candidates = candidates.len(),
                "no valid endpoints, selecting at random from all candidates"
            );
            let endpoints = if n == 1 {
                candidates.choose(&mut rng).cloned().into_iter().collect()
            } else {
                select_random(&candidates, n, &mut rng)
            };
            return Selection { endpoints, outcome: SelectionOutcome::RandomFallback };
        }

        if n == 1 {
            let endpoints = valid.choose(&mut rng).cloned().into_iter().collect();
            return Selection { endpoints, outcome: SelectionOutcome::Valid };
        }

        let selection = select_diverse(&valid, n, &mut rng);
        debug!(
            service_id = %self.service_id,
            available = valid.len(),
            selected = selection.endpoints.len(),
            distinct_domains = selection.distinct_domains,
            diversity_percent = selection.diversity_percent(),
            "selected endpoints across domains"
        );

        Selection { endpoints: selection.endpoints, outcome: SelectionOutcome::Valid }
    }
}
