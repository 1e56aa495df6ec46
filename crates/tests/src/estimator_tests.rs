//! Integration tests for perceived chain state estimation.
//!
//! These tests verify that the estimator:
//! - Tracks the maximum height reported by trusted endpoints
//! - Never lowers the perceived height except on reset
//! - Ignores endpoints on the wrong chain or under sanction
//! - Tracks the Solana epoch alongside the block height
//! - Chooses an archival block and fixes the expected balance by consensus

use crate::mock_infrastructure::{
    archival_evm_service, at, base_time, batch, comet_service, evm_service, solana_service,
    ObservationBuilder,
};
use qos_core::{
    config::ValidatorSettings, estimator::ARCHIVAL_CONSENSUS_THRESHOLD, ServiceQos,
};

#[test]
fn test_perceived_height_is_maximum() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let mut observations = Vec::new();
    for (name, height) in [("a", 100), ("b", 105), ("c", 98)] {
        observations.extend(ObservationBuilder::new(name, base_time()).evm("0x1", height));
    }

    let summary = service.apply_observations(&batch("eth", observations)).unwrap();

    assert_eq!(summary.perceived_block_height, 105);
    assert_eq!(service.perceived_state().block_height, 105);
}

#[test]
fn test_perceived_height_is_monotonic() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    service
        .apply_observations(&batch("eth", ObservationBuilder::new("a", at(0)).evm("0x1", 200)))
        .unwrap();

    let summary = service
        .apply_observations(&batch("eth", ObservationBuilder::new("a", at(1)).evm("0x1", 150)))
        .unwrap();

    assert!(!summary.height_raised);
    assert_eq!(service.perceived_state().block_height, 200);
}

#[test]
fn test_wrong_chain_does_not_raise_height() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let mut observations = ObservationBuilder::new("good", base_time()).evm("0x1", 100);
    observations.extend(ObservationBuilder::new("polygon", base_time()).evm("0x89", 60_000_000));

    service.apply_observations(&batch("eth", observations)).unwrap();

    assert_eq!(service.perceived_state().block_height, 100);
}

#[test]
fn test_sanctioned_endpoint_does_not_raise_height() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let bad = ObservationBuilder::new("bad", base_time());
    let mut observations = bad.evm("0x1", 999_999);
    observations.push(bad.empty());
    observations.extend(ObservationBuilder::new("good", base_time()).evm("0x1", 100));

    service.apply_observations(&batch("eth", observations)).unwrap();

    assert_eq!(service.perceived_state().block_height, 100);
}

#[test]
fn test_catching_up_node_does_not_raise_height() {
    let (service, _clock) = comet_service(ValidatorSettings::default());
    let mut observations = ObservationBuilder::new("synced", base_time()).comet("cosmoshub-4", false, 500);
    observations.extend(ObservationBuilder::new("syncing", base_time()).comet("cosmoshub-4", true, 900));

    service.apply_observations(&batch("cometbft", observations)).unwrap();

    assert_eq!(service.perceived_state().block_height, 500);
}

#[test]
fn test_solana_tracks_epoch() {
    let (service, _clock) = solana_service();
    let mut observations = ObservationBuilder::new("a", base_time()).solana(600, 1_000);
    observations.extend(ObservationBuilder::new("b", base_time()).solana(601, 990));

    service.apply_observations(&batch("solana", observations)).unwrap();

    let state = service.perceived_state();
    assert_eq!(state.epoch, 601);
    assert_eq!(state.block_height, 1_000);
}

#[test]
fn test_reset_clears_state_but_keeps_chain_id() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    service
        .apply_observations(&batch("eth", ObservationBuilder::new("a", base_time()).evm("0x1", 200)))
        .unwrap();

    service.reset_perceived_state();

    let state = service.perceived_state();
    assert_eq!(state.block_height, 0);
    assert_eq!(state.chain_id.as_deref(), Some("0x1"));

    service
        .apply_observations(&batch("eth", ObservationBuilder::new("a", at(1)).evm("0x1", 150)))
        .unwrap();
    assert_eq!(service.perceived_state().block_height, 150);
}

#[test]
fn test_archival_block_chosen_within_range() {
    let (service, _clock) = archival_evm_service("0xabc", 1_000);
    assert!(service.perceived_state().archival.is_none());

    service
        .apply_observations(&batch("eth", ObservationBuilder::new("a", base_time()).evm("0x1", 10_000)))
        .unwrap();

    let state = service.perceived_state();
    let target = state.archival.as_ref().unwrap();
    assert!(target.block >= 1_000 && target.block <= 10_000 - 128, "block {}", target.block);
    assert_eq!(target.block_hex, format!("0x{:x}", target.block));
    assert!(target.expected_balance.is_none());
}

#[test]
fn test_archival_block_fixed_until_reset() {
    let (service, _clock) = archival_evm_service("0xabc", 1_000);
    service
        .apply_observations(&batch("eth", ObservationBuilder::new("a", at(0)).evm("0x1", 10_000)))
        .unwrap();
    let chosen = service.perceived_state().archival_block().map(str::to_string);

    service
        .apply_observations(&batch("eth", ObservationBuilder::new("a", at(1)).evm("0x1", 20_000)))
        .unwrap();

    assert_eq!(service.perceived_state().archival_block().map(str::to_string), chosen);
}

#[test]
fn test_archival_balance_consensus() {
    let (service, _clock) = archival_evm_service("0xabc", 1_000);
    service
        .apply_observations(&batch("eth", ObservationBuilder::new("seed", at(0)).evm("0x1", 10_000)))
        .unwrap();
    let block = service.perceived_state().archival_block().unwrap().to_string();

    // One short of consensus.
    let names: Vec<String> = (0..ARCHIVAL_CONSENSUS_THRESHOLD).map(|i| format!("node-{i}")).collect();
    let mut observations = Vec::new();
    for name in &names[..ARCHIVAL_CONSENSUS_THRESHOLD - 1] {
        let obs = ObservationBuilder::new(name, at(1));
        observations.extend(obs.evm("0x1", 10_000));
        observations.push(obs.archival_balance(&block, "0xDEAD"));
    }
    service.apply_observations(&batch("eth", observations)).unwrap();
    assert!(service.perceived_state().expected_balance().is_none());

    let last = ObservationBuilder::new(&names[ARCHIVAL_CONSENSUS_THRESHOLD - 1], at(2));
    let mut observations = last.evm("0x1", 10_000);
    observations.push(last.archival_balance(&block, "0xdead"));
    service.apply_observations(&batch("eth", observations)).unwrap();

    assert_eq!(service.perceived_state().expected_balance(), Some("0xdead"));
}

#[test]
fn test_archival_votes_from_wrong_chain_ignored() {
    let (service, _clock) = archival_evm_service("0xabc", 1_000);
    service
        .apply_observations(&batch("eth", ObservationBuilder::new("seed", at(0)).evm("0x1", 10_000)))
        .unwrap();
    let block = service.perceived_state().archival_block().unwrap().to_string();

    let mut observations = Vec::new();
    for i in 0..ARCHIVAL_CONSENSUS_THRESHOLD {
        let obs = ObservationBuilder::new(&format!("polygon-{i}"), at(1));
        observations.extend(obs.evm("0x89", 10_000));
        observations.push(obs.archival_balance(&block, "0xbeef"));
    }
    service.apply_observations(&batch("eth", observations)).unwrap();

    assert!(service.perceived_state().expected_balance().is_none());
}
