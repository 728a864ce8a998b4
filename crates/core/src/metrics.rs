//! Prometheus metrics for the queue engine.
//!
//! The server registers these alongside its HTTP metrics; see
//! [`all_metrics`].

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Ticket lifecycle
// =============================================================================

/// Tickets issued total.
pub static TICKETS_ISSUED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("codenews_tickets_issued_total", "Total tickets issued").unwrap()
});

/// Tickets called total by priority class.
pub static TICKETS_CALLED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("codenews_tickets_called_total", "Total tickets called"),
        &["priority"], // "normal", "preferential", "urgent"
    )
    .unwrap()
});

/// Tickets finished total by reason.
pub static TICKETS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("codenews_tickets_finished_total", "Total tickets finished"),
        &["reason"], // "superseded", "finalized"
    )
    .unwrap()
});

/// Time from issuance to being called, in seconds.
pub static WAIT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "codenews_ticket_wait_seconds",
            "Time a ticket spent waiting before being called",
        )
        .buckets(vec![
            30.0, 60.0, 300.0, 600.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0,
        ]),
        &["priority"],
    )
    .unwrap()
});

// =============================================================================
// Failures
// =============================================================================

/// Operations rejected total by error kind.
pub static OPERATIONS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "codenews_queue_operations_rejected_total",
            "Total queue operations that returned an error",
        ),
        &["operation", "kind"],
    )
    .unwrap()
});

/// Injected faults total by operation.
pub static FAULTS_INJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("codenews_faults_injected_total", "Total simulated faults"),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Lifecycle
        Box::new(TICKETS_ISSUED.clone()),
        Box::new(TICKETS_CALLED.clone()),
        Box::new(TICKETS_FINISHED.clone()),
        Box::new(WAIT_DURATION.clone()),
        // Failures
        Box::new(OPERATIONS_REJECTED.clone()),
        Box::new(FAULTS_INJECTED.clone()),
    ]
}
