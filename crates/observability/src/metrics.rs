//! Lifecycle metrics
//!
//! Thin wrappers over the `metrics` facade; without an installed recorder
//! every call is a no-op.

use contracts::Phase;
use metrics::{counter, gauge};

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Record the outcome of one lifecycle phase
pub fn record_phase(phase: Phase, success: bool) {
    counter!(
        "proxy_phase_total",
        "phase" => phase.as_str(),
        "outcome" => outcome(success)
    )
    .increment(1);
}

/// Record the terminal outcome of one orchestrator run
///
/// `failed_phase` is `None` for a successful run.
pub fn record_run(failed_phase: Option<Phase>) {
    let phase = failed_phase.map(|p| p.as_str()).unwrap_or("none");
    counter!(
        "proxy_runs_total",
        "outcome" => outcome(failed_phase.is_none()),
        "failed_phase" => phase
    )
    .increment(1);
}

/// Record one request handed from the bus to the local handler
pub fn record_request_dispatched(success: bool) {
    counter!(
        "proxy_requests_dispatched_total",
        "status" => outcome(success)
    )
    .increment(1);
}

/// Record the dispatch queue depth
pub fn record_dispatch_depth(depth: usize) {
    gauge!("proxy_dispatch_queue_depth").set(depth as f64);
}

/// Record a failed disconnect during teardown
pub fn record_teardown_failure() {
    counter!("proxy_teardown_failures_total").increment(1);
}
