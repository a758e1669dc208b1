//! Reconciliation metrics.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `reconcile_polls_total{status}` - Poll outcomes by status
//! - `reconcile_poll_errors_total{code}` - Polls that ended in an error
//! - `reconcile_lock_contention_total` - Paid polls that lost the lock race
//! - `reconcile_side_effects_total{effect,outcome}` - Side-effect results
//! - `reconcile_guard_fallback_total{operation}` - Guard calls served from memory
//!
//! ## Histograms
//! - `reconcile_finalization_duration_seconds` - Paid-branch duration under the lock

use metrics::{describe_counter, describe_histogram};

/// Register all metric descriptions.
///
/// Call once at startup, after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "reconcile_polls_total",
        "Total number of polls by resulting status"
    );
    describe_counter!(
        "reconcile_poll_errors_total",
        "Total number of polls that ended in an error, by error code"
    );
    describe_counter!(
        "reconcile_lock_contention_total",
        "Paid polls that found the processing lock held elsewhere"
    );
    describe_counter!(
        "reconcile_side_effects_total",
        "Side-effect invocations by effect and outcome"
    );
    describe_counter!(
        "reconcile_guard_fallback_total",
        "Idempotency guard calls served by the in-process fallback"
    );
    describe_histogram!(
        "reconcile_finalization_duration_seconds",
        "Time spent in the paid finalization sequence"
    );

    tracing::info!("Reconciliation metrics registered");
}

/// Record a poll outcome.
pub fn record_poll(status: &'static str) {
    metrics::counter!("reconcile_polls_total", "status" => status).increment(1);
}

/// Record a poll that failed.
pub fn record_poll_error(code: &'static str) {
    metrics::counter!("reconcile_poll_errors_total", "code" => code).increment(1);
}

/// Record a lost lock race.
pub fn record_lock_contention() {
    metrics::counter!("reconcile_lock_contention_total").increment(1);
}

/// Record one side-effect result.
pub fn record_side_effect(effect: &'static str, succeeded: bool) {
    let outcome = if succeeded { "ok" } else { "failed" };
    metrics::counter!("reconcile_side_effects_total", "effect" => effect, "outcome" => outcome)
        .increment(1);
}

/// Record a guard call served from memory.
pub fn record_guard_fallback(operation: &'static str) {
    metrics::counter!("reconcile_guard_fallback_total", "operation" => operation).increment(1);
}

/// Record how long the paid sequence held the lock.
pub fn record_finalization_duration(duration_secs: f64) {
    metrics::histogram!("reconcile_finalization_duration_seconds").record(duration_secs);
}
