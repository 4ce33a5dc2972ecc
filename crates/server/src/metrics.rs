//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the guichet server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Ticket and counter status gauges (collected on scrape)
//! - Dispatch engine metrics registered from the core crate

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;

use guichet_core::{CounterFilter, CounterStatus, TicketFilter, TicketStatus};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "guichet_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("guichet_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "guichet_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Queue Metrics (collected dynamically)
// =============================================================================

/// Tickets by current status.
pub static TICKETS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("guichet_tickets_by_status", "Current ticket count by status"),
        &["status"],
    )
    .unwrap()
});

/// Counters by current status.
pub static COUNTERS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "guichet_counters_by_status",
            "Current counter count by status",
        ),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Queue
    registry
        .register(Box::new(TICKETS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(COUNTERS_BY_STATUS.clone()))
        .unwrap();

    // Core metrics (registration, assignment, lifecycle)
    for metric in guichet_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Refresh the status gauges from the store.
///
/// Called right before encoding so a scrape sees current counts. A failing
/// unit of work leaves the previous values in place.
pub fn collect_dynamic_metrics(state: &AppState) {
    let tx = match state.store().begin() {
        Ok(tx) => tx,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping gauge collection");
            return;
        }
    };

    for status in TicketStatus::ALL {
        let filter = TicketFilter::new().with_statuses(&[status]);
        if let Ok(count) = tx.count_tickets(&filter) {
            TICKETS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count);
        }
    }

    for status in [CounterStatus::Libre, CounterStatus::Occupe, CounterStatus::Ferme] {
        let filter = CounterFilter::new().with_statuses(&[status]);
        if let Ok(count) = tx.count_counters(&filter) {
            COUNTERS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count);
        }
    }
}

static COUNTER_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/counters/[^/]+").unwrap());
static FLIGHT_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/flights/[^/]+").unwrap());
static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = COUNTER_SEGMENT.replace_all(path, "/counters/{name}");
    let result = FLIGHT_SEGMENT.replace_all(&result, "/flights/{number}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}
