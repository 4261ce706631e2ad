//! Export metrics
//!
//! Counters and histograms are recorded through the `metrics` facade and are
//! free when no recorder is installed. [`init_metrics`] installs a Prometheus
//! exporter serving a scrape endpoint (e.g. `:9090/metrics`).

use crate::exporter::FailureKind;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, error, info};

static METRICS_INSTALLED: OnceCell<SocketAddr> = OnceCell::new();

/// Install the Prometheus exporter and register metric descriptions.
///
/// Idempotent: later calls are ignored once an exporter is installed.
///
/// # Arguments
/// * `addr` - Socket address for the scrape endpoint (e.g. "0.0.0.0:9090")
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(existing) = METRICS_INSTALLED.get() {
        debug!("Metrics already initialized on {}, skipping", existing);
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "export_pages_fetched_total",
        Unit::Count,
        "Total number of row pages retrieved from the endpoint"
    );

    describe_counter!(
        "export_rows_fetched_total",
        Unit::Count,
        "Total number of rows retrieved from the endpoint"
    );

    describe_counter!(
        "export_rows_written_total",
        Unit::Count,
        "Total number of data rows written to CSV files"
    );

    describe_counter!(
        "exports_completed_total",
        Unit::Count,
        "Total number of exports that produced a CSV file"
    );

    describe_counter!(
        "exports_failed_total",
        Unit::Count,
        "Total number of failed exports, by failure kind"
    );

    describe_histogram!(
        "export_duration_seconds",
        Unit::Seconds,
        "Wall time of a complete export run"
    );

    let _ = METRICS_INSTALLED.set(addr);
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Whether a Prometheus exporter has been installed
pub fn is_initialized() -> bool {
    METRICS_INSTALLED.get().is_some()
}

/// Record one retrieved page
pub fn record_page(rows: usize) {
    counter!("export_pages_fetched_total").increment(1);
    counter!("export_rows_fetched_total").increment(rows as u64);
}

/// Tracks one export run from start to outcome
pub struct ExportMetrics {
    table_id: String,
    start_time: Instant,
}

impl ExportMetrics {
    /// Start tracking an export
    pub fn start(table_id: impl Into<String>) -> Self {
        let table_id = table_id.into();
        debug!(table_id = %table_id, "Export metrics started");

        Self {
            table_id,
            start_time: Instant::now(),
        }
    }

    /// Record a completed export
    pub fn record_success(&self, rows_written: usize) {
        let duration = self.start_time.elapsed();

        counter!("export_rows_written_total").increment(rows_written as u64);
        counter!("exports_completed_total").increment(1);
        histogram!("export_duration_seconds", "outcome" => "success")
            .record(duration.as_secs_f64());

        info!(
            table_id = %self.table_id,
            rows_written = rows_written,
            duration_ms = duration.as_millis() as u64,
            "Export completed successfully"
        );
    }

    /// Record a failed export
    pub fn record_failure(&self, kind: FailureKind, message: &str) {
        let duration = self.start_time.elapsed();

        counter!("exports_failed_total", "kind" => kind.as_str()).increment(1);
        histogram!("export_duration_seconds", "outcome" => "failure")
            .record(duration.as_secs_f64());

        error!(
            table_id = %self.table_id,
            kind = %kind,
            error = %message,
            duration_ms = duration.as_millis() as u64,
            "Export failed"
        );
    }
}
