//! # QoS Metrics
//!
//! Engine operations report through the [`QosMetrics`] trait so the core
//! stays independent of the recorder in use:
//!
//! - [`PrometheusMetrics`]: records through the `metrics` facade into a global
//!   Prometheus recorder
//! - [`NoopMetrics`]: discards everything, used when metrics are disabled
//!
//! ## Exported Series
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `qos_observations_total` | counter | `service` |
//! | `qos_endpoints_changed_total` | counter | `service` |
//! | `qos_selections_total` | counter | `service`, `outcome` |
//! | `qos_validation_failures_total` | counter | `service`, `reason` |
//! | `qos_perceived_block_height` | gauge | `service` |
//! | `qos_hydrator_checks_total` | counter | `service`, `check` |
//!
//! ## String Interning
//!
//! Service ids are interned on first use so label values do not allocate per
//! call. The set of services is fixed at startup, which bounds the pool.

use crate::{endpoint::CheckKind, selector::SelectionOutcome, types::ServiceId, validation::ValidationError};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::{borrow::Cow, sync::OnceLock};

static PROMETHEUS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

static SERVICE_NAME_POOL: OnceLock<dashmap::DashMap<String, &'static str>> = OnceLock::new();

#[inline]
fn service_to_static(service: &ServiceId) -> Cow<'static, str> {
    let pool = SERVICE_NAME_POOL.get_or_init(dashmap::DashMap::new);

    if let Some(interned) = pool.get(service.as_str()) {
        return Cow::Borrowed(*interned);
    }

    let owned = service.as_str().to_string();
    let leaked: &'static str = Box::leak(owned.clone().into_boxed_str());
    pool.insert(owned, leaked);
    Cow::Borrowed(leaked)
}

/// Stable label value for an enum.
pub trait MetricLabel {
    fn as_metric_str(&self) -> &'static str;
}

impl MetricLabel for ValidationError {
    fn as_metric_str(&self) -> &'static str {
        self.as_str()
    }
}

impl MetricLabel for CheckKind {
    fn as_metric_str(&self) -> &'static str {
        self.as_str()
    }
}

/// Sink for engine metrics.
pub trait QosMetrics: Send + Sync {
    /// One observation batch was applied.
    fn record_observations(&self, service: &ServiceId, observations: usize, changed: usize);

    fn record_selection(&self, service: &ServiceId, outcome: SelectionOutcome, selected: usize);

    fn record_validation_failure(&self, service: &ServiceId, reason: &ValidationError);

    fn record_perceived_height(&self, service: &ServiceId, block_height: u64);

    /// The hydrator executed `executed` synthetic checks of type `check`.
    fn record_hydrator_checks(&self, service: &ServiceId, check: CheckKind, executed: usize);
}

/// Discards all metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl QosMetrics for NoopMetrics {
    fn record_observations(&self, _service: &ServiceId, _observations: usize, _changed: usize) {}

    fn record_selection(&self, _service: &ServiceId, _outcome: SelectionOutcome, _selected: usize) {
    }

    fn record_validation_failure(&self, _service: &ServiceId, _reason: &ValidationError) {}

    fn record_perceived_height(&self, _service: &ServiceId, _block_height: u64) {}

    fn record_hydrator_checks(&self, _service: &ServiceId, _check: CheckKind, _executed: usize) {}
}

fn try_init_prometheus_recorder(
) -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Installs the global Prometheus recorder once and returns its handle.
///
/// Returns `None` if another global recorder was installed first. Engine
/// metrics then go to that recorder and cannot be rendered from here.
pub fn install_prometheus_recorder() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE
        .get_or_init(|| match try_init_prometheus_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to install Prometheus recorder, metrics rendering disabled"
                );
                None
            }
        })
        .clone()
}

/// Records engine metrics into the global Prometheus recorder.
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Option<PrometheusHandle>,
}

impl PrometheusMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self { handle: install_prometheus_recorder() }
    }

    /// Renders all recorded series in the Prometheus text format, or `None`
    /// if the recorder could not be installed.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics")
            .field("rendering", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

impl QosMetrics for PrometheusMetrics {
    fn record_observations(&self, service: &ServiceId, observations: usize, changed: usize) {
        let service = service_to_static(service);
        counter!("qos_observations_total", "service" => service.clone())
            .increment(observations as u64);
        counter!("qos_endpoints_changed_total", "service" => service).increment(changed as u64);
    }

    fn record_selection(&self, service: &ServiceId, outcome: SelectionOutcome, selected: usize) {
        counter!(
            "qos_selections_total",
            "service" => service_to_static(service),
            "outcome" => outcome.as_metric_str()
        )
        .increment(selected as u64);
    }

    fn record_validation_failure(&self, service: &ServiceId, reason: &ValidationError) {
        counter!(
            "qos_validation_failures_total",
            "service" => service_to_static(service),
            "reason" => reason.as_metric_str()
        )
        .increment(1);
    }

    fn record_perceived_height(&self, service: &ServiceId, block_height: u64) {
        #[allow(clippy::cast_precision_loss)]
        gauge!("qos_perceived_block_height", "service" => service_to_static(service))
            .set(block_height as f64);
    }

    fn record_hydrator_checks(&self, service: &ServiceId, check: CheckKind, executed: usize) {
        counter!(
            "qos_hydrator_checks_total",
            "service" => service_to_static(service),
            "check" => check.as_metric_str()
        )
        .increment(executed as u64);
    }
}
