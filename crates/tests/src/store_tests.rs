//! Integration tests for observation application.
//!
//! These tests verify that the endpoint store:
//! - Applies batches idempotently
//! - Keeps the latest observation per slot regardless of arrival order
//! - Only touches endpoints named in the batch
//! - Records malformed values as invalid instead of dropping them
//! - Ignores observations the family does not track

use crate::mock_infrastructure::{at, base_time, batch, evm_service, ObservationBuilder};
use qos_core::{
    config::ValidatorSettings,
    endpoint::{CheckKind, SlotValue},
    validation::ValidationError,
    ObservationKind, ServiceQos,
};

#[test]
fn test_apply_is_idempotent() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let observations = ObservationBuilder::new("a", base_time()).evm("0x1", 100);

    let first = service.apply_observations(&batch("eth", observations.clone())).unwrap();
    let record = service.endpoint_record("a").unwrap();
    let second = service.apply_observations(&batch("eth", observations)).unwrap();

    assert_eq!(first.changed_endpoints, 1);
    assert_eq!(second.changed_endpoints, 0);
    assert!(!second.height_raised);
    assert_eq!(service.endpoint_record("a").unwrap(), record);
}

#[test]
fn test_latest_completion_wins() {
    let (service, _clock) = evm_service(ValidatorSettings::default());

    let newer = ObservationBuilder::new("a", at(10)).block_number(200);
    let older = ObservationBuilder::new("a", at(5)).block_number(300);
    service.apply_observations(&batch("eth", vec![newer])).unwrap();
    let summary = service.apply_observations(&batch("eth", vec![older])).unwrap();

    assert_eq!(summary.changed_endpoints, 0);
    let record = service.endpoint_record("a").unwrap();
    assert_eq!(record.block_number().unwrap().valid(), Some(&200));
    assert_eq!(record.block_number().unwrap().observed_at, at(10));
}

#[test]
fn test_newer_lower_height_overwrites_record() {
    let (service, _clock) = evm_service(ValidatorSettings::default());

    service
        .apply_observations(&batch("eth", vec![ObservationBuilder::new("a", at(0)).block_number(200)]))
        .unwrap();
    service
        .apply_observations(&batch("eth", vec![ObservationBuilder::new("a", at(1)).block_number(150)]))
        .unwrap();

    let record = service.endpoint_record("a").unwrap();
    assert_eq!(record.block_number().unwrap().valid(), Some(&150));
}

#[test]
fn test_batch_touches_only_named_endpoints() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let a = ObservationBuilder::new("a", base_time());
    let b = ObservationBuilder::new("b", base_time());

    let mut observations = a.evm("0x1", 100);
    observations.extend(b.evm("0x1", 100));
    service.apply_observations(&batch("eth", observations)).unwrap();
    let b_before = service.endpoint_record("b").unwrap();

    let summary = service
        .apply_observations(&batch("eth", vec![ObservationBuilder::new("a", at(5)).block_number(101)]))
        .unwrap();

    assert_eq!(summary.changed_endpoints, 1);
    assert_eq!(service.endpoint_record("b").unwrap(), b_before);
    assert!(service.endpoint_record("c").is_none());
}

#[test]
fn test_malformed_block_number_recorded_as_invalid() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let a = ObservationBuilder::new("a", base_time());

    service
        .apply_observations(&batch(
            "eth",
            vec![
                a.chain_id("0x1"),
                a.observation(ObservationKind::BlockNumber { block_number: "0xZZ".to_string() }),
            ],
        ))
        .unwrap();

    let record = service.endpoint_record("a").unwrap();
    assert!(matches!(record.block_number().unwrap().value, SlotValue::Invalid { .. }));

    let report = service.disqualified_endpoints();
    assert!(matches!(
        report.disqualified[0].reason,
        ValidationError::MalformedObservation { check: CheckKind::BlockNumber, .. }
    ));
}

#[test]
fn test_zero_height_is_invalid() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let a = ObservationBuilder::new("a", base_time());

    let summary = service
        .apply_observations(&batch(
            "eth",
            vec![
                a.chain_id("0x1"),
                a.observation(ObservationKind::BlockNumber { block_number: "0x0".to_string() }),
            ],
        ))
        .unwrap();

    assert_eq!(summary.perceived_block_height, 0);
    let record = service.endpoint_record("a").unwrap();
    assert!(record.block_number().unwrap().valid().is_none());
}

#[test]
fn test_untracked_observations_ignored() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let a = ObservationBuilder::new("a", base_time());

    let summary = service
        .apply_observations(&batch(
            "eth",
            vec![
                a.observation(ObservationKind::Unrecognized { method: "eth_call".to_string() }),
                a.epoch_info(10, 1000),
                a.health(true),
            ],
        ))
        .unwrap();

    assert_eq!(summary.observations, 3);
    assert_eq!(summary.changed_endpoints, 0);
    assert!(service.endpoint_record("a").is_none());
}

#[test]
fn test_slot_expiry_follows_check_interval() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let a = ObservationBuilder::new("a", base_time());
    service.apply_observations(&batch("eth", a.evm("0x1", 100))).unwrap();

    let record = service.endpoint_record("a").unwrap();
    assert_eq!(record.block_number().unwrap().expires_at, Some(at(60)));
    assert_eq!(record.chain_id().unwrap().expires_at, Some(at(20 * 60)));
}
