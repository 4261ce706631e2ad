//! Export command implementation

use crate::exporter::{
    AutoConfirm, Confirmer, ExportExecutor, ExportJob, ExportOutcome, LogProgress, ProgressEvent,
    ProgressFanout, StdinConfirm,
};
use crate::fetcher::http::HttpRowSource;
use crate::output::LocalOutputPolicy;
use crate::shutdown::SharedShutdown;
use crate::store::RowStore;
use crate::{EndpointInfo, FormatConfig};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{error, info};

use super::CliError;

/// Default application id on sync servers
const DEFAULT_APP_ID: &str = "default";

/// Per-request timeout for page retrieval
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Table CSV Exporter CLI
#[derive(Parser, Debug)]
#[command(name = "table-csv-exporter")]
#[command(about = "Export rows of a remote table into a CSV file", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g. 0.0.0.0:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export one table to CSV
    Export(ExportArgs),
}

/// Arguments for exporting a table
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Server base URL (e.g. https://sync.example.org)
    #[arg(long)]
    pub url: String,

    /// Application id on the server
    #[arg(long, default_value = DEFAULT_APP_ID)]
    pub app_id: String,

    /// Table to export
    #[arg(long)]
    pub table_id: String,

    /// Root directory for exported files
    #[arg(long, default_value = "exports")]
    pub output_dir: PathBuf,

    /// Comma-separated header columns, in order
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Keep `_`-prefixed metadata columns in a derived header
    #[arg(long, default_value_t = false)]
    pub include_metadata: bool,

    /// Text written for null or missing values
    #[arg(long)]
    pub null_value: Option<String>,

    /// Fail when a row lacks a header column
    #[arg(long, default_value_t = false)]
    pub strict_columns: bool,

    /// JSON file with format settings; flags override its values
    #[arg(long)]
    pub format_config: Option<PathBuf>,

    /// Ask before overwriting an existing export
    #[arg(long, default_value_t = false)]
    pub interactive: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl ExportArgs {
    /// Resolve the effective format settings: config file first, then flags.
    pub fn format_config(&self) -> Result<FormatConfig, CliError> {
        let mut config = match &self.format_config {
            Some(path) => FormatConfig::load(path)?,
            None => FormatConfig::default(),
        };

        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if !columns.is_empty() {
            config.columns = Some(columns);
        }
        if self.include_metadata {
            config.include_metadata = true;
        }
        if self.strict_columns {
            config.strict_columns = true;
        }
        if let Some(null_value) = &self.null_value {
            config.null_value = null_value.clone();
        }

        config.validate().map_err(CliError::InvalidArgument)?;
        Ok(config)
    }

    /// Build the export job described by the arguments
    pub fn build_job(&self) -> Result<ExportJob, CliError> {
        let endpoint = EndpointInfo::parse(&self.url, &self.app_id)?;
        let job = ExportJob::new(
            endpoint,
            self.table_id.trim(),
            self.format_config()?,
            self.output_dir.clone(),
        )
        .interactive(self.interactive);

        job.validate().map_err(CliError::InvalidArgument)?;
        Ok(job)
    }

    /// Run the export and print a summary.
    ///
    /// A failed export is reported through the returned outcome, not as an error.
    pub async fn execute(
        &self,
        cli: &Cli,
        shutdown: SharedShutdown,
    ) -> Result<ExportOutcome, CliError> {
        let job = self.build_job()?;
        let table_id = job.table_id.clone();

        let client = reqwest::Client::builder()
            .user_agent(concat!("table-csv-exporter/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CliError::HttpClientError(e.to_string()))?;
        let source = HttpRowSource::new(client, &job.endpoint);

        let confirmer: Arc<dyn Confirmer> = if self.interactive {
            Arc::new(StdinConfirm)
        } else {
            Arc::new(AutoConfirm::default())
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let bar_task = tokio::spawn(drive_progress_bar(create_progress_bar(&table_id), rx));
        let progress = ProgressFanout::new()
            .with_sink(Arc::new(tx))
            .with_sink(Arc::new(LogProgress));

        let executor = ExportExecutor::new(Arc::new(source), Arc::new(LocalOutputPolicy))
            .with_progress(Arc::new(progress))
            .with_confirmer(confirmer)
            .with_shutdown(shutdown);

        info!(
            "Starting export: table {} from {}",
            table_id, job.endpoint.base_url
        );
        let task = executor.spawn(job, RowStore::new(table_id.as_str()));
        // Release our sender so the bar task ends with the export
        drop(executor);
        let outcome = task.wait().await;
        let _ = bar_task.await;

        let summary = ExportSummary::new(&table_id, &outcome);
        match cli.output_format {
            OutputFormat::Json => output_json(&summary),
            OutputFormat::Human => output_human(&summary),
        }

        Ok(outcome)
    }
}

/// Result of an export as reported to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Whether the CSV was written
    pub success: bool,
    /// Table that was exported
    pub table_id: String,
    /// Written file, on success
    pub output_path: Option<String>,
    /// Data rows written, on success
    pub rows_written: Option<usize>,
    /// Failure class, on failure
    pub error_kind: Option<String>,
    /// User-facing failure message, on failure
    pub error: Option<String>,
    /// Underlying error detail, on failure
    pub detail: Option<String>,
}

impl ExportSummary {
    /// Summarize an outcome
    pub fn new(table_id: &str, outcome: &ExportOutcome) -> Self {
        match outcome {
            ExportOutcome::Success {
                rows_written,
                output_path,
            } => Self {
                success: true,
                table_id: table_id.to_string(),
                output_path: Some(output_path.display().to_string()),
                rows_written: Some(*rows_written),
                error_kind: None,
                error: None,
                detail: None,
            },
            ExportOutcome::Failure { kind, message } => Self {
                success: false,
                table_id: table_id.to_string(),
                output_path: None,
                rows_written: None,
                error_kind: Some(kind.as_str().to_string()),
                error: Some(kind.user_message().to_string()),
                detail: Some(message.clone()),
            },
        }
    }
}

fn output_json(summary: &ExportSummary) {
    match serde_json::to_string(summary) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("Failed to serialize summary: {}", e),
    }
}

fn output_human(summary: &ExportSummary) {
    if summary.success {
        println!("\nExport completed successfully!");
        println!("Table: {}", summary.table_id);
        if let Some(path) = &summary.output_path {
            println!("Output: {path}");
        }
        if let Some(rows) = summary.rows_written {
            println!("Rows written: {rows}");
        }
    } else {
        eprintln!("\nExport failed!");
        if let Some(message) = &summary.error {
            eprintln!("Error: {message}");
        }
        if let Some(detail) = &summary.detail {
            eprintln!("Details: {detail}");
            error!("Export failed: {}", detail);
        }
    }
}

// ─── Progress bar ────────────────────────────────────────────────────────────

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        .expect("hardcoded template is valid")
        .progress_chars("#>-")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .expect("hardcoded template is valid")
}

/// Create the export progress bar (percent scale)
fn create_progress_bar(table_id: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(bar_style());
    pb.set_message(format!("Exporting {table_id}"));
    pb
}

/// Apply one progress event to the bar
fn apply_event(pb: &ProgressBar, event: &ProgressEvent) {
    if let Some(label) = &event.stage_label {
        pb.set_message(label.clone());
        if event.indeterminate == Some(true) {
            pb.set_style(spinner_style());
            pb.enable_steady_tick(Duration::from_millis(120));
        } else {
            pb.disable_steady_tick();
            pb.set_style(bar_style());
        }
    }
    pb.set_position(u64::from(event.percent));
}

async fn drive_progress_bar(pb: ProgressBar, mut rx: UnboundedReceiver<ProgressEvent>) {
    while let Some(event) = rx.recv().await {
        apply_event(&pb, &event);
    }
    pb.finish_and_clear();
}
