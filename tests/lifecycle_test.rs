//! Request Lifecycle Tests
//!
//! Randomized scripts with random completion order: every request must
//! complete exactly once, answer every query it issued, and succeed exactly
//! when some hostname query returned addresses.

mod common;

use common::{ips, Answer, ScriptedBackend};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rpcresolv::base::{QueryStatus, ResolveError};
use rpcresolv::dns::{DnsResolver, ResolveRequest, SrvRecord};
use std::time::Duration;

const FAILURES: [QueryStatus; 4] = [
    QueryStatus::NotFound,
    QueryStatus::NoData,
    QueryStatus::ServerFailure,
    QueryStatus::Refused,
];

struct Case {
    backend: ScriptedBackend,
    expect_success: bool,
    expected_addresses: usize,
}

fn delay(rng: &mut StdRng) -> Duration {
    Duration::from_millis(rng.gen_range(0..50))
}

/// Scripts A/AAAA for `host`; returns how many addresses it yields.
fn script_host(backend: &ScriptedBackend, rng: &mut StdRng, host: &str) -> usize {
    let mut found = 0;
    for kind in ["AAAA", "A"] {
        let answer = if rng.gen_bool(0.5) {
            let addr = if kind == "A" {
                format!("10.{}.{}.1", rng.gen_range(0..=255), rng.gen_range(0..=255))
            } else {
                format!("2001:db8::{:x}", rng.gen_range(1..0xffffu32))
            };
            found += 1;
            Answer::Hosts(Ok(ips(&[&addr])))
        } else {
            Answer::Hosts(Err(FAILURES[rng.gen_range(0..FAILURES.len())].clone()))
        };
        backend.answer_after(&format!("{kind} {host}"), answer, delay(rng));
    }
    found
}

fn build_case(seed: u64) -> Case {
    let mut rng = StdRng::seed_from_u64(seed);
    let backend = ScriptedBackend::new();
    let mut expected_addresses = script_host(&backend, &mut rng, "svc.example.com");

    let balancers = rng.gen_range(0..4);
    if balancers == 0 {
        backend.answer_after(
            "SRV _grpclb._tcp.svc.example.com",
            Answer::Srv(Err(FAILURES[rng.gen_range(0..FAILURES.len())].clone())),
            delay(&mut rng),
        );
    } else {
        let records = (0..balancers)
            .map(|i| SrvRecord::new(format!("lb{i}.example.com"), 9000 + i))
            .collect();
        backend.answer_after(
            "SRV _grpclb._tcp.svc.example.com",
            Answer::Srv(Ok(records)),
            delay(&mut rng),
        );
        for i in 0..balancers {
            expected_addresses += script_host(&backend, &mut rng, &format!("lb{i}.example.com"));
        }
    }

    Case {
        backend,
        expect_success: expected_addresses > 0,
        expected_addresses,
    }
}

#[tokio::test(start_paused = true)]
async fn test_random_completion_orders() {
    for seed in 0..200 {
        let case = build_case(seed);
        let resolver = DnsResolver::builder()
            .backend(case.backend.clone())
            .query_ipv6(true)
            .build()
            .unwrap();

        let result = resolver
            .resolve(ResolveRequest::new("svc.example.com:443").balancers(true))
            .await;

        match &result {
            Ok(resolution) => {
                assert!(case.expect_success, "seed {seed}: unexpected success");
                assert_eq!(resolution.addresses.len(), case.expected_addresses, "seed {seed}");
            }
            Err(e) => {
                assert!(!case.expect_success, "seed {seed}: unexpected failure {e}");
                assert!(
                    e.causes().iter().all(|c| matches!(c, ResolveError::Query { .. })),
                    "seed {seed}: {e}"
                );
            }
        }

        let issued = case.backend.issued();
        let srv_ok = issued.iter().any(|q| q.contains(" lb"));
        assert!(issued.len() >= 3, "seed {seed}: {issued:?}");
        if srv_ok {
            assert_eq!((issued.len() - 3) % 2, 0, "seed {seed}: {issued:?}");
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_random_cancellation() {
    for seed in 0..100 {
        let case = build_case(seed);
        let resolver = DnsResolver::builder()
            .backend(case.backend.clone())
            .query_ipv6(true)
            .build()
            .unwrap();

        let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
        let pending = resolver.resolve(ResolveRequest::new("svc.example.com:443").balancers(true));
        let handle = pending.cancel_handle();
        let cancel_at = Duration::from_millis(rng.gen_range(0..60));
        tokio::spawn(async move {
            tokio::time::sleep(cancel_at).await;
            handle.cancel();
        });

        // Completes exactly once: either before the cancel landed or with
        // the cancellation.
        match pending.await {
            Ok(resolution) => assert_eq!(resolution.addresses.len(), case.expected_addresses),
            Err(ResolveError::Canceled) => {}
            Err(e) => assert!(!case.expect_success, "seed {seed}: {e}"),
        }
    }
}
