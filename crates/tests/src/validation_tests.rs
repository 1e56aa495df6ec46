//! Integration tests for per-family validation.
//!
//! These tests verify that each family validator:
//! - Rejects endpoints on the wrong chain
//! - Applies the sync allowance against the perceived height
//! - Combines identity and freshness checks conjunctively
//! - Reports missing observations as their own reason

use crate::mock_infrastructure::{
    addrs, at, base_time, batch, comet_service, cosmos_service, evm_service, solana_service,
    ObservationBuilder,
};
use qos_core::{
    config::{ApiKind, ValidatorSettings},
    endpoint::CheckKind,
    selector::CandidateOutcome,
    validation::{DisqualificationCategory, ValidationError},
    ServiceQos,
};

fn outcome_of<S: ServiceQos>(service: &S, endpoint: &str) -> CandidateOutcome {
    let report = service.select_with_metadata(&addrs(&[endpoint])).unwrap();
    report.results[0].outcome.clone()
}

#[test]
fn test_evm_sync_allowance_example() {
    let (service, _clock) = evm_service(ValidatorSettings::default().with_sync_allowance(5));
    let mut observations = ObservationBuilder::new("a", base_time()).evm("0x1", 100);
    observations.extend(ObservationBuilder::new("b", base_time()).evm("0x1", 50));
    service.apply_observations(&batch("eth", observations)).unwrap();

    for _ in 0..50 {
        assert_eq!(service.select(&addrs(&["a", "b"])).unwrap().as_str(), "a");
    }

    assert_eq!(
        outcome_of(&service, "b"),
        CandidateOutcome::Invalid(ValidationError::OutsideSyncAllowance {
            check: CheckKind::BlockNumber,
            height: 50,
            min_allowed: 95,
            perceived: 100,
            sync_allowance: 5,
        })
    );
}

#[test]
fn test_evm_height_at_allowance_boundary_valid() {
    let (service, _clock) = evm_service(ValidatorSettings::default().with_sync_allowance(5));
    let mut observations = ObservationBuilder::new("tip", base_time()).evm("0x1", 100);
    observations.extend(ObservationBuilder::new("edge", base_time()).evm("0x1", 95));
    observations.extend(ObservationBuilder::new("past", base_time()).evm("0x1", 94));
    service.apply_observations(&batch("eth", observations)).unwrap();

    assert_eq!(outcome_of(&service, "edge"), CandidateOutcome::Valid);
    assert!(matches!(outcome_of(&service, "past"), CandidateOutcome::Invalid(_)));
}

#[test]
fn test_evm_wrong_chain_rejected() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    service
        .apply_observations(&batch("eth", ObservationBuilder::new("a", base_time()).evm("0x89", 100)))
        .unwrap();

    let report = service.disqualified_endpoints();
    assert_eq!(report.chain_id_check_errors_count, 1);
    assert_eq!(report.disqualified[0].category, DisqualificationCategory::ChainId);
}

#[test]
fn test_missing_block_number_reported() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    service
        .apply_observations(&batch("eth", vec![ObservationBuilder::new("a", base_time()).chain_id("0x1")]))
        .unwrap();

    assert_eq!(
        outcome_of(&service, "a"),
        CandidateOutcome::Invalid(ValidationError::NoObservation { check: CheckKind::BlockNumber })
    );
}

#[test]
fn test_unknown_endpoint_not_found() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    assert_eq!(outcome_of(&service, "ghost"), CandidateOutcome::NotFound);
}

#[test]
fn test_expired_slot_still_validates() {
    let (service, clock) = evm_service(ValidatorSettings::default());
    service
        .apply_observations(&batch("eth", ObservationBuilder::new("a", base_time()).evm("0x1", 100)))
        .unwrap();

    clock.set(at(3600));

    assert_eq!(outcome_of(&service, "a"), CandidateOutcome::Valid);
}

#[test]
fn test_comet_catching_up_excluded_regardless_of_height() {
    let (service, _clock) = comet_service(ValidatorSettings::default());
    let mut observations =
        ObservationBuilder::new("synced", base_time()).comet("cosmoshub-4", false, 500);
    observations.extend(ObservationBuilder::new("syncing", base_time()).comet("cosmoshub-4", true, 500));
    service.apply_observations(&batch("cometbft", observations)).unwrap();

    assert_eq!(outcome_of(&service, "synced"), CandidateOutcome::Valid);
    assert_eq!(outcome_of(&service, "syncing"), CandidateOutcome::Invalid(ValidationError::CatchingUp));
}

#[test]
fn test_comet_unhealthy_excluded() {
    let (service, _clock) = comet_service(ValidatorSettings::default());
    let node = ObservationBuilder::new("a", base_time());
    service
        .apply_observations(&batch(
            "cometbft",
            vec![node.health(false), node.status("cosmoshub-4", false, 500)],
        ))
        .unwrap();

    assert_eq!(outcome_of(&service, "a"), CandidateOutcome::Invalid(ValidationError::Unhealthy));
}

#[test]
fn test_comet_wrong_network_rejected() {
    let (service, _clock) = comet_service(ValidatorSettings::default());
    service
        .apply_observations(&batch(
            "cometbft",
            ObservationBuilder::new("a", base_time()).comet("osmosis-1", false, 500),
        ))
        .unwrap();

    assert!(matches!(
        outcome_of(&service, "a"),
        CandidateOutcome::Invalid(ValidationError::WrongChainId { check: CheckKind::Status, .. })
    ));
}

#[test]
fn test_cosmos_rest_height_checked() {
    let (service, _clock) = cosmos_service(
        None,
        &[ApiKind::CometBft, ApiKind::Rest],
        ValidatorSettings::default(),
    );
    let fresh = ObservationBuilder::new("fresh", base_time());
    let stale_rest = ObservationBuilder::new("stale-rest", base_time());

    let mut observations = fresh.comet("cosmoshub-4", false, 1_000);
    observations.push(fresh.cosmos_status(1_000));
    observations.extend(stale_rest.comet("cosmoshub-4", false, 1_000));
    observations.push(stale_rest.cosmos_status(900));
    service.apply_observations(&batch("cosmos", observations)).unwrap();

    assert_eq!(outcome_of(&service, "fresh"), CandidateOutcome::Valid);
    assert!(matches!(
        outcome_of(&service, "stale-rest"),
        CandidateOutcome::Invalid(ValidationError::OutsideSyncAllowance {
            check: CheckKind::CosmosStatus,
            ..
        })
    ));
}

#[test]
fn test_cosmos_evm_chain_id_checked() {
    let (service, _clock) = cosmos_service(
        Some("0x2328"),
        &[ApiKind::CometBft, ApiKind::JsonRpc],
        ValidatorSettings::default(),
    );
    let good = ObservationBuilder::new("good", base_time());
    let bad = ObservationBuilder::new("bad", base_time());

    let mut observations = good.comet("cosmoshub-4", false, 1_000);
    observations.push(good.observation(qos_core::ObservationKind::EvmChainId {
        chain_id: "0x2328".to_string(),
    }));
    observations.extend(bad.comet("cosmoshub-4", false, 1_000));
    observations.push(bad.observation(qos_core::ObservationKind::EvmChainId {
        chain_id: "0x1".to_string(),
    }));
    service.apply_observations(&batch("cosmos", observations)).unwrap();

    assert_eq!(outcome_of(&service, "good"), CandidateOutcome::Valid);
    assert!(matches!(
        outcome_of(&service, "bad"),
        CandidateOutcome::Invalid(ValidationError::WrongChainId { check: CheckKind::EvmChainId, .. })
    ));
}

#[test]
fn test_solana_epoch_behind_excluded() {
    let (service, _clock) = solana_service();
    let mut observations = ObservationBuilder::new("current", base_time()).solana(601, 1_000);
    observations.extend(ObservationBuilder::new("previous", base_time()).solana(600, 1_000));
    service.apply_observations(&batch("solana", observations)).unwrap();

    assert_eq!(outcome_of(&service, "current"), CandidateOutcome::Valid);
    assert_eq!(
        outcome_of(&service, "previous"),
        CandidateOutcome::Invalid(ValidationError::EpochBehind { epoch: 600, perceived: 601 })
    );
}

#[test]
fn test_solana_zero_allowance_requires_tip() {
    let (service, _clock) = solana_service();
    let mut observations = ObservationBuilder::new("tip", base_time()).solana(601, 1_000);
    observations.extend(ObservationBuilder::new("lagging", base_time()).solana(601, 999));
    service.apply_observations(&batch("solana", observations)).unwrap();

    assert_eq!(service.select(&addrs(&["tip", "lagging"])).unwrap().as_str(), "tip");
    assert!(matches!(
        outcome_of(&service, "lagging"),
        CandidateOutcome::Invalid(ValidationError::OutsideSyncAllowance { .. })
    ));
}

#[test]
fn test_archival_mismatch_excluded_after_consensus() {
    use crate::mock_infrastructure::archival_evm_service;
    use qos_core::estimator::ARCHIVAL_CONSENSUS_THRESHOLD;

    let (service, _clock) = archival_evm_service("0xabc", 1_000);
    service
        .apply_observations(&batch("eth", ObservationBuilder::new("seed", at(0)).evm("0x1", 10_000)))
        .unwrap();
    let block = service.perceived_state().archival_block().unwrap().to_string();

    let mut observations = Vec::new();
    for i in 0..ARCHIVAL_CONSENSUS_THRESHOLD {
        let node = ObservationBuilder::new(&format!("archive-{i}"), at(1));
        observations.extend(node.evm("0x1", 10_000));
        observations.push(node.archival_balance(&block, "0x10"));
    }
    let pruned = ObservationBuilder::new("pruned", at(1));
    observations.extend(pruned.evm("0x1", 10_000));
    observations.push(pruned.archival_balance(&block, "0x0"));
    service.apply_observations(&batch("eth", observations)).unwrap();

    assert_eq!(outcome_of(&service, "archive-0"), CandidateOutcome::Valid);
    assert!(matches!(
        outcome_of(&service, "pruned"),
        CandidateOutcome::Invalid(ValidationError::ArchivalMismatch { .. })
    ));
    // No archival sample at all once consensus exists.
    assert_eq!(
        outcome_of(&service, "seed"),
        CandidateOutcome::Invalid(ValidationError::NoObservation { check: CheckKind::Archival })
    );
}
