//! Concurrency tests for one shared service.
//!
//! Writers apply observation batches while readers select endpoints and
//! read the perceived state. These tests verify that:
//! - Every selection returns one of the candidates
//! - The perceived block height never moves backwards
//! - The final state reflects every applied batch
//! - An endpoint flipping between chains never lifts the perceived height
//!   with a value it only reported on the wrong chain

use crate::mock_infrastructure::{addrs, at, batch, evm_service, ObservationBuilder};
use qos_core::{config::ValidatorSettings, ServiceQos};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

const WRITERS: usize = 4;
const ROUNDS: u64 = 200;

fn endpoint(writer: usize) -> String {
    format!("https://node-{writer}.alpha.com")
}

#[test]
fn test_concurrent_apply_and_select() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let service = Arc::new(service);
    let names: Vec<String> = (0..WRITERS).map(endpoint).collect();
    let candidates = addrs(&names.iter().map(String::as_str).collect::<Vec<_>>());
    let done = Arc::new(AtomicBool::new(false));

    thread::scope(|scope| {
        let readers: Vec<_> = (0..2)
            .map(|_| {
                let service = Arc::clone(&service);
                let done = Arc::clone(&done);
                let candidates = candidates.clone();
                scope.spawn(move || {
                    let mut last_height = 0;
                    let mut selections = 0usize;
                    while !done.load(Ordering::Acquire) {
                        let selected = service.select(&candidates).unwrap();
                        assert!(candidates.contains(&selected));

                        let height = service.perceived_state().block_height;
                        assert!(height >= last_height, "perceived height moved backwards");
                        last_height = height;
                        selections += 1;
                    }
                    selections
                })
            })
            .collect();

        let writers: Vec<_> = (0..WRITERS)
            .map(|writer| {
                let service = Arc::clone(&service);
                scope.spawn(move || {
                    for round in 1..=ROUNDS {
                        let obs = ObservationBuilder::new(&endpoint(writer), at(round as i64));
                        let height = 1_000 + round * WRITERS as u64 + writer as u64;
                        service.apply_observations(&batch("eth", obs.evm("0x1", height))).unwrap();
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
    });

    let expected = 1_000 + ROUNDS * WRITERS as u64 + (WRITERS as u64 - 1);
    assert_eq!(service.perceived_state().block_height, expected);
    assert_eq!(service.disqualified_endpoints().total_endpoints, WRITERS);
}

#[test]
fn test_same_endpoint_contended_across_chains() {
    const WRONG_CHAIN_BASE: u64 = 5_000_000;
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let service = Arc::new(service);
    let name = endpoint(0);
    let candidates = addrs(&[name.as_str()]);
    let done = Arc::new(AtomicBool::new(false));

    thread::scope(|scope| {
        let reader = {
            let service = Arc::clone(&service);
            let done = Arc::clone(&done);
            scope.spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let height = service.perceived_state().block_height;
                    assert!(height < WRONG_CHAIN_BASE, "wrong-chain height {height} was perceived");
                    assert!(height <= 1_000 + ROUNDS);
                    thread::yield_now();
                }
            })
        };

        let on_chain = {
            let service = Arc::clone(&service);
            let name = name.clone();
            scope.spawn(move || {
                for round in 1..=ROUNDS {
                    let obs = ObservationBuilder::new(&name, at((round * 10) as i64));
                    let summary =
                        service.apply_observations(&batch("eth", obs.evm("0x1", 1_000 + round))).unwrap();
                    if summary.changed_endpoints == 1 {
                        assert!(summary.perceived_block_height >= 1_000 + round);
                    }
                }
            })
        };

        let off_chain = {
            let service = Arc::clone(&service);
            let name = name.clone();
            scope.spawn(move || {
                for round in 1..=ROUNDS {
                    let obs = ObservationBuilder::new(&name, at((round * 10 + 1) as i64));
                    service
                        .apply_observations(&batch("eth", obs.evm("0x89", WRONG_CHAIN_BASE + round)))
                        .unwrap();
                }
            })
        };

        on_chain.join().unwrap();
        off_chain.join().unwrap();
        done.store(true, Ordering::Release);
        reader.join().unwrap();
    });

    assert!(service.perceived_state().block_height < WRONG_CHAIN_BASE);

    // The newest batch came from the wrong chain.
    let report = service.disqualified_endpoints();
    assert_eq!(report.total_endpoints, 1);
    assert_eq!(report.valid_endpoints, 0);
    assert!(candidates.contains(&service.select(&candidates).unwrap()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_share_service() {
    let (service, _clock) = evm_service(ValidatorSettings::default());
    let service = Arc::new(service);

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let name = endpoint(writer);
                for round in 1..=50u64 {
                    let obs = ObservationBuilder::new(&name, at(round as i64));
                    service.apply_observations(&batch("eth", obs.evm("0x1", 500 + round))).unwrap();
                    let selected = service.select(&addrs(&[name.as_str()])).unwrap();
                    assert_eq!(selected.as_str(), name);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        result.unwrap();
    }

    assert_eq!(service.perceived_state().block_height, 550);
    let report = service.disqualified_endpoints();
    assert_eq!(report.valid_endpoints, WRITERS);
}
