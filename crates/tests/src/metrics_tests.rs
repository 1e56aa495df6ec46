//! Integration tests for Prometheus metrics when another recorder owns the
//! global slot.
//!
//! This binary never installs a Prometheus recorder itself, so the foreign
//! recorder always wins.

use crate::mock_infrastructure::{at, batch, ObservationBuilder};
use qos_core::{
    clock::ManualClock,
    config::ValidatorSettings,
    metrics::{install_prometheus_recorder, PrometheusMetrics},
    service::QosService,
    validation::EvmValidator,
    ServiceId, ServiceQos,
};
use std::sync::Arc;

#[test]
fn test_foreign_global_recorder_disables_rendering() {
    let _ = metrics::set_global_recorder(metrics::NoopRecorder);

    assert!(install_prometheus_recorder().is_none());

    let prometheus = PrometheusMetrics::new();
    assert!(prometheus.render().is_none());

    // Recording still goes through without a rendering handle.
    let service = QosService::new(
        ServiceId::from("eth"),
        EvmValidator::new("0x1", None, ValidatorSettings::default()),
        Arc::new(prometheus),
        Arc::new(ManualClock::new(at(0))),
    );
    let obs = ObservationBuilder::new("https://node.alpha.com", at(1));
    let summary = service.apply_observations(&batch("eth", obs.evm("0x1", 100))).unwrap();
    assert_eq!(summary.perceived_block_height, 100);
}
