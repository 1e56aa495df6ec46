//! Background endpoint hydration.
//!
//! The hydrator keeps endpoint records fresh between organic relays. On every
//! tick it asks each registered service which synthetic checks are due,
//! executes them through an injected [`CheckExecutor`] and feeds the resulting
//! observations back through [`ServiceQos::apply_observations`].
//!
//! The hydrator never performs I/O itself: endpoint discovery and request
//! execution belong to the [`EndpointSource`] and [`CheckExecutor`]
//! implementations supplied by the gateway.

use crate::{
    config::HydratorConfig,
    endpoint::CheckKind,
    errors::QosError,
    metrics::QosMetrics,
    observation::{Observation, ObservationBatch},
    registry::QosRegistry,
    scheduler::CheckRequest,
    service::ServiceQos,
    types::{EndpointAddr, ServiceId},
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::broadcast, time::interval};
use tracing::{debug, info, warn};

const MIN_RUN_INTERVAL: Duration = Duration::from_secs(1);

/// Supplies the endpoints currently serving a service.
#[async_trait]
pub trait EndpointSource: Send + Sync {
    async fn endpoints(&self, service_id: &ServiceId) -> Vec<EndpointAddr>;
}

/// Sends one synthetic check and decodes the response into observations.
///
/// Transport failures are reported as observations (`Empty`,
/// `InvalidResponse`) rather than errors so they reach the store.
#[async_trait]
pub trait CheckExecutor: Send + Sync {
    async fn execute(&self, request: &CheckRequest) -> Vec<Observation>;
}

/// Totals of one hydrator pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HydrationSummary {
    pub services: usize,
    pub endpoints: usize,
    pub checks_executed: usize,
    pub observations: usize,
    pub changed_endpoints: usize,
    pub failed_services: usize,
}

impl HydrationSummary {
    fn merge(&mut self, other: &Self) {
        self.services += other.services;
        self.endpoints += other.endpoints;
        self.checks_executed += other.checks_executed;
        self.observations += other.observations;
        self.changed_endpoints += other.changed_endpoints;
        self.failed_services += other.failed_services;
    }
}

/// Periodically runs due synthetic checks for every registered service.
pub struct EndpointHydrator {
    registry: Arc<QosRegistry>,
    source: Arc<dyn EndpointSource>,
    executor: Arc<dyn CheckExecutor>,
    metrics: Arc<dyn QosMetrics>,
    config: HydratorConfig,
    alive: AtomicBool,
}

impl EndpointHydrator {
    #[must_use]
    pub fn new(
        registry: Arc<QosRegistry>,
        source: Arc<dyn EndpointSource>,
        executor: Arc<dyn CheckExecutor>,
        metrics: Arc<dyn QosMetrics>,
        config: HydratorConfig,
    ) -> Self {
        Self { registry, source, executor, metrics, config, alive: AtomicBool::new(false) }
    }

    /// Whether the last pass completed for every service.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Runs one pass over every registered service.
    pub async fn run_once(&self) -> HydrationSummary {
        let mut summary = HydrationSummary::default();

        for service_id in self.registry.service_ids() {
            let Some(service) = self.registry.get(&service_id) else {
                continue;
            };

            match self.hydrate_service(service.as_ref()).await {
                Ok(service_summary) => summary.merge(&service_summary),
                Err(e) => {
                    warn!(service_id = %service_id, error = %e, "endpoint hydration failed");
                    summary.services += 1;
                    summary.failed_services += 1;
                }
            }
        }

        self.alive.store(summary.failed_services == 0, Ordering::Release);
        summary
    }

    async fn hydrate_service(&self, service: &dyn ServiceQos) -> Result<HydrationSummary, QosError> {
        let service_id = service.service_id().clone();
        let endpoints = self.source.endpoints(&service_id).await;

        let requests: Vec<CheckRequest> =
            endpoints.iter().flat_map(|endpoint| service.required_checks(endpoint)).collect();

        let mut summary =
            HydrationSummary { services: 1, endpoints: endpoints.len(), ..HydrationSummary::default() };
        if requests.is_empty() {
            debug!(service_id = %service_id, endpoints = endpoints.len(), "no checks due");
            return Ok(summary);
        }

        let workers = self.config.max_endpoint_check_workers.max(1);
        let results: Vec<(CheckKind, Vec<Observation>)> = stream::iter(requests)
            .map(|request| {
                let executor = Arc::clone(&self.executor);
                async move {
                    let observations = executor.execute(&request).await;
                    (request.check, observations)
                }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        // Identity checks sort ahead of height and archival checks.
        let mut by_check: BTreeMap<CheckKind, (usize, Vec<Observation>)> = BTreeMap::new();
        for (check, observations) in results {
            let entry = by_check.entry(check).or_default();
            entry.0 += 1;
            entry.1.extend(observations);
        }

        for (check, (executed, observations)) in by_check {
            self.metrics.record_hydrator_checks(&service_id, check, executed);
            summary.checks_executed += executed;
            summary.observations += observations.len();

            let batch = ObservationBatch::new(service_id.clone(), observations);
            let applied = service.apply_observations(&batch)?;
            summary.changed_endpoints += applied.changed_endpoints;
        }

        debug!(
            service_id = %service_id,
            endpoints = summary.endpoints,
            checks = summary.checks_executed,
            changed = summary.changed_endpoints,
            "endpoint hydration completed"
        );
        Ok(summary)
    }

    /// Spawns the hydration loop, stopping when `shutdown_rx` fires.
    pub fn start_with_shutdown(
        self: Arc<Self>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if !self.config.enabled {
                info!("endpoint hydrator disabled");
                return;
            }

            let mut ticker = interval(self.config.run_interval().max(MIN_RUN_INTERVAL));
            info!(
                interval_secs = self.config.run_interval_seconds,
                workers = self.config.max_endpoint_check_workers,
                "endpoint hydrator started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let summary = self.run_once().await;
                        if summary.failed_services > 0 {
                            warn!(failed = summary.failed_services, "hydrator pass incomplete");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("endpoint hydrator shutting down");
                        break;
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for EndpointHydrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointHydrator")
            .field("services", &self.registry.len())
            .field("config", &self.config)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}
