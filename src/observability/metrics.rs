//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): inbound relay requests by route, outcome
//! - `relay_request_duration_seconds` (histogram): inbound latency by route
//! - `relay_stage_failures_total` (counter): failed destination calls by stage
//!
//! # Design Decisions
//! - Labels stay low-cardinality: configured route paths, fixed stage names
//! - Histogram buckets tuned for calls that cross two or three network hops

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "relay_requests_total";
pub const REQUEST_DURATION: &str = "relay_request_duration_seconds";
pub const STAGE_FAILURES_TOTAL: &str = "relay_stage_failures_total";

const DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), DURATION_BUCKETS)?
        .install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one inbound relay request.
pub fn record_request(route: &str, outcome: &'static str, start: Instant) {
    let route = route.to_string();
    counter!(REQUESTS_TOTAL, "route" => route.clone(), "outcome" => outcome).increment(1);
    histogram!(REQUEST_DURATION, "route" => route).record(start.elapsed().as_secs_f64());
}

/// Record a destination call that failed at `stage`.
pub fn record_stage_failure(stage: &'static str) {
    counter!(STAGE_FAILURES_TOTAL, "stage" => stage).increment(1);
}
