//! Integration tests for synthetic check scheduling.
//!
//! These tests verify that:
//! - Unobserved endpoints need every family check
//! - Fresh slots are not re-probed until their interval elapses
//! - Archival probes wait for an archival block and carry it as a parameter
//! - Each family emits the documented request ids, methods and paths

use crate::mock_infrastructure::{
    archival_evm_service, at, base_time, batch, comet_service, cosmos_service, evm_service,
    solana_service, ObservationBuilder,
};
use qos_core::{
    config::{ApiKind, ValidatorSettings},
    endpoint::CheckKind,
    scheduler::{CheckPayload, CheckRequest},
    EndpointAddr, ServiceQos,
};
use serde_json::json;
use std::time::Duration;

fn checks(requests: &[CheckRequest]) -> Vec<CheckKind> {
    requests.iter().map(|r| r.check).collect()
}

fn due(service: &impl ServiceQos, endpoint: &str) -> Vec<CheckRequest> {
    service.required_checks(&EndpointAddr::from(endpoint))
}

#[test]
fn test_evm_checks_follow_intervals() {
    let (service, clock) = evm_service(ValidatorSettings::default());
    assert_eq!(checks(&due(&service, "a")), vec![CheckKind::ChainId, CheckKind::BlockNumber]);

    service
        .apply_observations(&batch("eth", ObservationBuilder::new("a", base_time()).evm("0x1", 100)))
        .unwrap();
    assert!(due(&service, "a").is_empty());

    clock.advance(Duration::from_secs(60));
    assert_eq!(checks(&due(&service, "a")), vec![CheckKind::BlockNumber]);

    clock.set(at(20 * 60));
    assert_eq!(checks(&due(&service, "a")), vec![CheckKind::ChainId, CheckKind::BlockNumber]);
}

#[test]
fn test_evm_payloads() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let requests = due(&service, "a");

    assert_eq!(requests[0].payload, CheckPayload::json_rpc(1001, "eth_chainId"));
    assert_eq!(requests[1].payload, CheckPayload::json_rpc(1002, "eth_blockNumber"));
    assert_eq!(
        requests[1].payload.to_json_rpc_body(),
        Some(json!({ "jsonrpc": "2.0", "id": 1002, "method": "eth_blockNumber", "params": [] }))
    );
    assert_eq!(requests[0].service_id.as_str(), "eth");
    assert_eq!(requests[0].endpoint.as_str(), "a");
}

#[test]
fn test_archival_check_waits_for_block() {
    let (service, _clock) = archival_evm_service("0xabc", 1_000);
    assert!(!checks(&due(&service, "a")).contains(&CheckKind::Archival));

    service
        .apply_observations(&batch("eth", ObservationBuilder::new("seed", base_time()).evm("0x1", 10_000)))
        .unwrap();
    let block = service.perceived_state().archival_block().unwrap().to_string();

    let requests = due(&service, "a");
    let archival = requests.iter().find(|r| r.check == CheckKind::Archival).unwrap();
    assert_eq!(
        archival.payload,
        CheckPayload::json_rpc_with_params(1003, "eth_getBalance", json!(["0xabc", block]))
    );
}

#[test]
fn test_comet_payloads() {
    let (service, _clock) = comet_service(ValidatorSettings::default());
    let requests = due(&service, "a");

    assert_eq!(checks(&requests), vec![CheckKind::Health, CheckKind::Status]);
    assert_eq!(requests[0].payload, CheckPayload::json_rpc(2001, "health"));
    assert_eq!(requests[1].payload, CheckPayload::json_rpc(2002, "status"));
}

#[test]
fn test_cosmos_checks_follow_supported_apis() {
    let (service, _clock) = cosmos_service(
        Some("0x2328"),
        &[ApiKind::CometBft, ApiKind::Rest, ApiKind::JsonRpc],
        ValidatorSettings::default(),
    );
    let requests = due(&service, "a");

    assert_eq!(
        checks(&requests),
        vec![CheckKind::Health, CheckKind::Status, CheckKind::CosmosStatus, CheckKind::EvmChainId]
    );
    assert_eq!(requests[2].payload, CheckPayload::rest("/cosmos/base/node/v1beta1/status"));
    assert!(requests[2].payload.to_json_rpc_body().is_none());
    assert_eq!(requests[3].payload, CheckPayload::json_rpc(2003, "eth_chainId"));

    let (rest_only, _clock) = cosmos_service(None, &[ApiKind::Rest], ValidatorSettings::default());
    assert_eq!(checks(&due(&rest_only, "a")), vec![CheckKind::CosmosStatus]);
}

#[test]
fn test_solana_payloads() {
    let (service, clock) = solana_service();
    let requests = due(&service, "a");

    assert_eq!(requests[0].payload, CheckPayload::json_rpc(3001, "getHealth"));
    assert_eq!(requests[1].payload, CheckPayload::json_rpc(3002, "getEpochInfo"));

    service
        .apply_observations(&batch("solana", ObservationBuilder::new("a", base_time()).solana(600, 1_000)))
        .unwrap();
    assert!(due(&service, "a").is_empty());

    clock.advance(Duration::from_secs(30));
    assert_eq!(checks(&due(&service, "a")), vec![CheckKind::Health, CheckKind::EpochInfo]);
}

#[test]
fn test_sanction_does_not_schedule_checks() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let node = ObservationBuilder::new("a", base_time());
    let mut observations = node.evm("0x1", 100);
    observations.push(node.empty());
    service.apply_observations(&batch("eth", observations)).unwrap();

    assert!(due(&service, "a").is_empty());
}
