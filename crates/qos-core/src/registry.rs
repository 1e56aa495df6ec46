//! Registry of per-service QoS engines.

use crate::{
    clock::Clock,
    config::{AppConfig, FamilyConfig, ServiceQosConfig},
    errors::QosError,
    metrics::QosMetrics,
    observation::ObservationBatch,
    service::{ApplySummary, QosService, ServiceQos},
    types::ServiceId,
    validation::{CometBftValidator, CosmosValidator, EvmValidator, SolanaValidator},
};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use tracing::info;

/// Maps service ids to their QoS engine.
///
/// Services are registered at startup; lookups are lock-free reads of a
/// sharded map.
#[derive(Default)]
pub struct QosRegistry {
    services: DashMap<ServiceId, Arc<dyn ServiceQos>>,
}

impl QosRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one service per configured entry.
    ///
    /// # Errors
    ///
    /// Returns [`QosError::InvalidConfig`] if the configuration fails
    /// validation, or [`QosError::DuplicateService`] if a service id repeats.
    pub fn from_config(
        config: &AppConfig,
        metrics: Arc<dyn QosMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, QosError> {
        // Duplicates are reported as such before the general checks run.
        let registry = Self::new();
        for service in &config.services {
            let built = build_service(service, metrics.clone(), clock.clone());
            registry.register(built)?;
        }
        config.validate().map_err(QosError::InvalidConfig)?;

        info!(services = registry.len(), "QoS registry initialized");
        Ok(registry)
    }

    /// Adds a service.
    ///
    /// # Errors
    ///
    /// Returns [`QosError::DuplicateService`] if the id is already registered.
    pub fn register(&self, service: Arc<dyn ServiceQos>) -> Result<(), QosError> {
        let id = service.service_id().clone();
        match self.services.entry(id) {
            Entry::Occupied(entry) => Err(QosError::DuplicateService(entry.key().clone())),
            Entry::Vacant(entry) => {
                info!(
                    service_id = %entry.key(),
                    family = %service.family(),
                    "QoS service registered"
                );
                entry.insert(service);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn get(&self, service_id: &ServiceId) -> Option<Arc<dyn ServiceQos>> {
        self.services.get(service_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Registered service ids, sorted.
    #[must_use]
    pub fn service_ids(&self) -> Vec<ServiceId> {
        let mut ids: Vec<ServiceId> = self.services.iter().map(|e| e.key().clone()).collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Routes a batch to the service it belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`QosError::UnknownService`] if no service is registered for the batch.
    pub fn apply_observations(&self, batch: &ObservationBatch) -> Result<ApplySummary, QosError> {
        let service = self
            .get(&batch.service_id)
            .ok_or_else(|| QosError::UnknownService(batch.service_id.clone()))?;
        service.apply_observations(batch)
    }
}

impl std::fmt::Debug for QosRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QosRegistry").field("services", &self.service_ids()).finish()
    }
}

/// Builds the engine for one configured service.
#[must_use]
pub fn build_service(
    config: &ServiceQosConfig,
    metrics: Arc<dyn QosMetrics>,
    clock: Arc<dyn Clock>,
) -> Arc<dyn ServiceQos> {
    let service_id = ServiceId::new(config.service_id.as_str());
    let settings = config.validator_settings();

    match &config.family {
        FamilyConfig::Evm(evm) => Arc::new(QosService::new(
            service_id,
            EvmValidator::new(evm.chain_id.clone(), evm.archival.clone(), settings),
            metrics,
            clock,
        )),
        FamilyConfig::CometBft(comet) => Arc::new(QosService::new(
            service_id,
            CometBftValidator::new(comet.chain_id.clone(), settings),
            metrics,
            clock,
        )),
        FamilyConfig::Cosmos(cosmos) => Arc::new(QosService::new(
            service_id,
            CosmosValidator::new(
                cosmos.chain_id.clone(),
                cosmos.evm_chain_id.clone(),
                &cosmos.supported_apis,
                settings,
            ),
            metrics,
            clock,
        )),
        FamilyConfig::Solana(_) => {
            Arc::new(QosService::new(service_id, SolanaValidator::new(settings), metrics, clock))
        }
    }
}
