//! Concurrent fan-out of probes for one test run.
//!
//! One OS thread per vantage host, all wired to a bounded channel created
//! fresh for the run. The orchestrator returns immediately; it performs no
//! ordering, batching, or timeout logic of its own.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, bounded};
use tracing::debug;

use crate::audit::AuditLog;
use crate::probe::{self, TestResult};
use crate::registry::VantageHost;

/// Receiving side of one run: the result stream plus the count the
/// aggregator compares against for completion. Producers never close the
/// stream; completion is always `collected == expected`, never a
/// channel-disconnect signal.
#[derive(Debug)]
pub struct RunHandle {
    pub results: Receiver<TestResult>,
    pub expected: usize,
}

/// Launch one SSH probe per vantage host against `destination` and return
/// without waiting for any of them.
pub fn start(hosts: &[VantageHost], destination: &str, audit: &AuditLog) -> RunHandle {
    let audit = audit.clone();
    start_with(hosts, destination, move |host, destination| {
        probe::run(host, destination, &audit)
    })
}

/// Fan `probe` out over the hosts. Every launched probe eventually emits
/// exactly one result into the stream — a panicking probe body is caught
/// and converted into a failed result, never dropped.
pub fn start_with<F>(hosts: &[VantageHost], destination: &str, probe: F) -> RunHandle
where
    F: Fn(&VantageHost, &str) -> TestResult + Send + Sync + 'static,
{
    // Capacity matches the producer count, so no probe ever blocks waiting
    // for buffer space.
    let (tx, rx) = bounded(hosts.len());
    let probe = Arc::new(probe);

    for host in hosts {
        let probe_tx = tx.clone();
        let probe_host = host.clone();
        let probe_destination = destination.to_string();
        let probe = Arc::clone(&probe);

        let spawned = thread::Builder::new()
            .name(format!("probe-{}", host.name))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    probe(&probe_host, &probe_destination)
                }));
                let result = outcome.unwrap_or_else(|_| {
                    TestResult::failed(&probe_host.name, &probe_destination, "probe task panicked")
                });
                // A failed send means the run was discarded; the result is
                // dropped rather than delivered late to a newer run.
                if probe_tx.send(result).is_err() {
                    debug!(server = %probe_host.name, "run discarded before result delivery");
                }
            });

        if let Err(err) = spawned {
            // A probe that never launched still owes the stream one result.
            let _ = tx.send(TestResult::failed(
                &host.name,
                destination,
                format!("failed to spawn probe thread: {err}"),
            ));
        }
    }

    RunHandle {
        results: rx,
        expected: hosts.len(),
    }
}
