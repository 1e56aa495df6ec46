//! Synthetic check scheduling.
//!
//! A check is due for an endpoint when its slot has never been filled or its
//! expiry has passed. The payload for each due check comes from the family
//! validator; the scheduler itself only decides *when*.

use crate::{
    endpoint::{CheckKind, EndpointRecord},
    estimator::PerceivedChainState,
    types::{EndpointAddr, ServiceId},
    validation::Validator,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

/// Body of a synthetic check request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum CheckPayload {
    JsonRpc { id: u64, method: &'static str, params: Value },
    Rest { path: &'static str },
}

impl CheckPayload {
    /// JSON-RPC request without parameters.
    #[must_use]
    pub fn json_rpc(id: u64, method: &'static str) -> Self {
        Self::JsonRpc { id, method, params: Value::Array(Vec::new()) }
    }

    #[must_use]
    pub fn json_rpc_with_params(id: u64, method: &'static str, params: Value) -> Self {
        Self::JsonRpc { id, method, params }
    }

    #[must_use]
    pub fn rest(path: &'static str) -> Self {
        Self::Rest { path }
    }

    /// Full JSON-RPC 2.0 request body, or `None` for REST checks.
    #[must_use]
    pub fn to_json_rpc_body(&self) -> Option<Value> {
        match self {
            Self::JsonRpc { id, method, params } => {
                Some(json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            }
            Self::Rest { .. } => None,
        }
    }
}

/// A synthetic check to send to one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckRequest {
    pub service_id: ServiceId,
    pub endpoint: EndpointAddr,
    pub check: CheckKind,
    pub payload: CheckPayload,
}

/// Returns the checks due for `endpoint`, in the family's probing order.
///
/// `record` is `None` for an endpoint that has never been observed; every
/// check is then due. The archival check is skipped until an archival block
/// has been chosen.
pub fn required_checks<V: Validator + ?Sized>(
    validator: &V,
    service_id: &ServiceId,
    endpoint: &EndpointAddr,
    record: Option<&EndpointRecord>,
    perceived: &PerceivedChainState,
    now: DateTime<Utc>,
) -> Vec<CheckRequest> {
    validator
        .checks()
        .iter()
        .filter(|check| {
            record.and_then(|r| r.slot_meta(**check)).is_none_or(|meta| meta.is_expired(now))
        })
        .filter_map(|check| {
            validator.check_payload(*check, perceived).map(|payload| CheckRequest {
                service_id: service_id.clone(),
                endpoint: endpoint.clone(),
                check: *check,
                payload,
            })
        })
        .collect()
}
