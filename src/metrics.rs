//! Run metrics for the archive downloader
//!
//! Counters and gauges are emitted through the `metrics` facade. Without an
//! installed recorder they are no-ops, so library callers and tests pay
//! nothing. [`init_metrics`] installs a Prometheus scrape endpoint.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::TimeSlot;

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: a second call is a no-op.
///
/// # Arguments
/// * `addr` - Socket address to bind the scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "slots_downloaded_total",
        Unit::Count,
        "Slots whose archive was downloaded and validated"
    );

    describe_counter!(
        "slots_failed_total",
        Unit::Count,
        "Slots abandoned after the retry budget was spent"
    );

    describe_counter!(
        "files_rejected_total",
        Unit::Count,
        "Downloaded files deleted for being below the size threshold"
    );

    describe_counter!(
        "proxy_failures_total",
        Unit::Count,
        "Proxy attempts that failed and advanced the rotation"
    );

    describe_counter!(
        "direct_fallbacks_total",
        Unit::Count,
        "Requests that fell back to a direct connection after all proxies failed"
    );

    describe_histogram!(
        "slot_duration_seconds",
        Unit::Seconds,
        "Wall time spent on a single slot"
    );

    describe_gauge!(
        "last_completed_slot",
        Unit::Seconds,
        "Unix timestamp of the last slot written to the progress marker"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Whether [`init_metrics`] has installed the exporter
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Count a slot that downloaded successfully.
pub fn record_slot_downloaded() {
    counter!("slots_downloaded_total").increment(1);
}

/// Count a slot that failed after retries.
pub fn record_slot_failed() {
    counter!("slots_failed_total").increment(1);
}

/// Count a downloaded file deleted by the validator.
pub fn record_file_rejected() {
    counter!("files_rejected_total").increment(1);
}

/// Count a failed proxy attempt.
pub fn record_proxy_failure() {
    counter!("proxy_failures_total").increment(1);
}

/// Count a fallback to a direct connection.
pub fn record_direct_fallback() {
    counter!("direct_fallbacks_total").increment(1);
}

/// Publish the slot last persisted to the progress marker.
pub fn record_last_completed(slot: TimeSlot) {
    gauge!("last_completed_slot").set(slot.and_utc().timestamp() as f64);
}

/// Per-slot timing
pub struct SlotMetrics {
    slot: TimeSlot,
    start_time: Instant,
}

impl SlotMetrics {
    /// Start timing `slot`
    pub fn start(slot: TimeSlot) -> Self {
        Self {
            slot,
            start_time: Instant::now(),
        }
    }

    /// Record the outcome and elapsed time.
    pub fn finish(self, downloaded: bool) {
        let duration = self.start_time.elapsed();
        histogram!(
            "slot_duration_seconds",
            "outcome" => if downloaded { "downloaded" } else { "failed" },
        )
        .record(duration.as_secs_f64());

        if downloaded {
            record_slot_downloaded();
        } else {
            record_slot_failed();
        }

        debug!(
            slot = %self.slot,
            downloaded,
            duration_ms = duration.as_millis(),
            "Slot finished"
        );
    }
}
