//! Hydrator collaborators with canned behavior.

use async_trait::async_trait;
use parking_lot::Mutex;
use qos_core::{
    hydrator::{CheckExecutor, EndpointSource},
    scheduler::{CheckPayload, CheckRequest},
    EndpointAddr, Observation, ObservationKind, ServiceId,
};
use std::{collections::HashMap, sync::Arc};

use super::test_helpers::base_time;

/// Returns a fixed endpoint list per service.
#[derive(Debug, Default)]
pub struct StaticEndpointSource {
    endpoints: HashMap<ServiceId, Vec<EndpointAddr>>,
}

impl StaticEndpointSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_service(mut self, service: &str, endpoints: &[&str]) -> Self {
        self.endpoints.insert(
            ServiceId::from(service),
            endpoints.iter().map(|e| EndpointAddr::from(*e)).collect(),
        );
        self
    }
}

#[async_trait]
impl EndpointSource for StaticEndpointSource {
    async fn endpoints(&self, service_id: &ServiceId) -> Vec<EndpointAddr> {
        self.endpoints.get(service_id).cloned().unwrap_or_default()
    }
}

type Responder = dyn Fn(&CheckRequest) -> Vec<ObservationKind> + Send + Sync;

/// Answers each check with the kinds produced by a closure and records
/// every request it sees.
pub struct ScriptedExecutor {
    responder: Box<Responder>,
    requests: Mutex<Vec<CheckRequest>>,
}

impl ScriptedExecutor {
    pub fn new(
        responder: impl Fn(&CheckRequest) -> Vec<ObservationKind> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self { responder: Box::new(responder), requests: Mutex::new(Vec::new()) })
    }

    /// Answers EVM checks as a healthy mainnet node at `height`.
    #[must_use]
    pub fn healthy_evm(height: u64) -> Arc<Self> {
        Self::new(move |request| match &request.payload {
            CheckPayload::JsonRpc { method: "eth_chainId", .. } => {
                vec![ObservationKind::ChainId { chain_id: "0x1".to_string() }]
            }
            CheckPayload::JsonRpc { method: "eth_blockNumber", .. } => {
                vec![ObservationKind::BlockNumber { block_number: format!("0x{height:x}") }]
            }
            _ => vec![ObservationKind::Empty],
        })
    }

    #[must_use]
    pub fn requests(&self) -> Vec<CheckRequest> {
        self.requests.lock().clone()
    }
}

impl std::fmt::Debug for ScriptedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedExecutor").field("requests", &self.requests.lock().len()).finish()
    }
}

#[async_trait]
impl CheckExecutor for ScriptedExecutor {
    async fn execute(&self, request: &CheckRequest) -> Vec<Observation> {
        self.requests.lock().push(request.clone());
        (self.responder)(request)
            .into_iter()
            .map(|kind| Observation::new(request.endpoint.clone(), base_time(), kind))
            .collect()
    }
}
