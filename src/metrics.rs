//! Observability metrics for the extraction engine
//!
//! Counters for API traffic, retry behavior, extraction throughput, and
//! checkpoint health, exported through a Prometheus scrape endpoint. All
//! recording helpers are cheap no-ops until [`init_metrics`] installs the
//! exporter, so the library never requires a metrics backend.

use metrics::{counter, describe_counter, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the Prometheus exporter and register metric descriptions.
///
/// Call once at application startup from within a Tokio runtime; repeated
/// calls are ignored.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        debug!("metrics already initialized, skipping");
        return Ok(());
    }

    info!(%addr, "initializing metrics exporter");
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "crm_api_requests_total",
        Unit::Count,
        "HTTP requests issued to the CRM API, by method and status"
    );
    describe_counter!(
        "crm_api_retries_total",
        Unit::Count,
        "Retry attempts, by trigger"
    );
    describe_counter!(
        "crm_api_rate_limited_total",
        Unit::Count,
        "429 responses received from the CRM API"
    );
    describe_counter!(
        "extraction_pages_total",
        Unit::Count,
        "Pages fully consumed by the extraction engine"
    );
    describe_counter!(
        "extraction_records_total",
        Unit::Count,
        "Records emitted by the extraction engine"
    );
    describe_counter!(
        "checkpoints_saved_total",
        Unit::Count,
        "Checkpoints persisted successfully, by phase"
    );
    describe_counter!(
        "checkpoint_failures_total",
        Unit::Count,
        "Checkpoint persistence failures, by phase"
    );

    Ok(())
}

/// Record one HTTP request and its response status.
pub fn record_api_request(method: &str, status: u16) {
    counter!(
        "crm_api_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a retry attempt and what triggered it.
pub fn record_api_retry(reason: &'static str) {
    counter!("crm_api_retries_total", "reason" => reason).increment(1);
}

/// Record a 429 response.
pub fn record_rate_limited() {
    counter!("crm_api_rate_limited_total").increment(1);
}

/// Record a fully consumed page and the records it contributed.
pub fn record_page_consumed(records: u64) {
    counter!("extraction_pages_total").increment(1);
    counter!("extraction_records_total").increment(records);
}

/// Record a successful checkpoint save.
pub fn record_checkpoint_saved(phase: &str) {
    counter!("checkpoints_saved_total", "phase" => phase.to_string()).increment(1);
}

/// Record a checkpoint persistence failure.
pub fn record_checkpoint_failure(phase: &str) {
    counter!("checkpoint_failures_total", "phase" => phase.to_string()).increment(1);
}
