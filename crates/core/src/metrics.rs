//! Prometheus metrics for the dispatch engine.
//!
//! This module provides metrics for:
//! - Registration (tickets issued, rejections, wait estimates)
//! - Counter assignment outcomes
//! - Ticket lifecycle transitions

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Registration Metrics
// =============================================================================

/// Tickets issued total by service prefix.
pub static TICKETS_REGISTERED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("guichet_tickets_registered_total", "Total tickets issued"),
        &["service"],
    )
    .unwrap()
});

/// Registrations rejected total by reason.
pub static REGISTRATIONS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "guichet_registrations_rejected_total",
            "Total registrations rejected before a ticket was created",
        ),
        &["reason"], // "service", "company", "not_scheduled", "store"
    )
    .unwrap()
});

/// Wait estimates handed out, in minutes. The -1 sentinel is not observed.
pub static ESTIMATED_WAIT: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "guichet_estimated_wait_minutes",
            "Distribution of wait estimates given at registration",
        )
        .buckets(vec![0.0, 5.0, 10.0, 15.0, 30.0, 45.0, 60.0, 90.0, 120.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Assignment Metrics
// =============================================================================

/// Counter assignment attempts by outcome.
pub static COUNTER_ASSIGNMENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "guichet_counter_assignments_total",
            "Total counter assignment attempts",
        ),
        &["outcome"], // "assigned", "no_counter", "failed"
    )
    .unwrap()
});

// =============================================================================
// Lifecycle Metrics
// =============================================================================

/// Ticket status transitions.
pub static TICKET_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "guichet_ticket_transitions_total",
            "Total ticket status transitions",
        ),
        &["from", "to"],
    )
    .unwrap()
});

/// Rejected lifecycle actions by action.
pub static INVALID_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "guichet_invalid_transitions_total",
            "Total lifecycle actions attempted from the wrong status",
        ),
        &["action"],
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Registration
        Box::new(TICKETS_REGISTERED.clone()),
        Box::new(REGISTRATIONS_REJECTED.clone()),
        Box::new(ESTIMATED_WAIT.clone()),
        // Assignment
        Box::new(COUNTER_ASSIGNMENTS.clone()),
        // Lifecycle
        Box::new(TICKET_TRANSITIONS.clone()),
        Box::new(INVALID_TRANSITIONS.clone()),
    ]
}
