//! Export orchestration
//!
//! This module drives one table export from start to finish:
//!
//! 1. **Prior output check**: an existing CSV is only replaced after confirmation
//! 2. **Retrieval**: the [`crate::fetcher::PaginatedFetcher`] fills the row store,
//!    unless the store already holds rows
//! 3. **Writing**: the [`crate::output::csv`] serializer writes the header and rows
//! 4. **Outcome**: any failure is classified into a [`FailureKind`]
//!
//! Progress flows out as [`ProgressEvent`]s through a [`ProgressSink`].
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use table_csv_exporter::exporter::{ExportExecutor, ExportJob};
//! use table_csv_exporter::fetcher::http::HttpRowSource;
//! use table_csv_exporter::output::LocalOutputPolicy;
//! use table_csv_exporter::{EndpointInfo, FormatConfig, RowStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = EndpointInfo::parse("https://sync.example.org", "default")?;
//! let source = Arc::new(HttpRowSource::new(reqwest::Client::new(), &endpoint));
//! let executor = ExportExecutor::new(source, Arc::new(LocalOutputPolicy));
//!
//! let mut job = ExportJob::new(endpoint, "census", FormatConfig::default(), "./exports");
//! let mut store = RowStore::new("census");
//! let outcome = executor.run(&mut job, &mut store).await;
//! assert!(outcome.is_success());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod confirm;
pub mod executor;
pub mod job;
pub mod progress;

pub use confirm::{AutoConfirm, Confirmer, StdinConfirm};
pub use executor::{ExportExecutor, ExportTask};
pub use job::{ExportJob, ExportStatus};
pub use progress::{LogProgress, NoProgress, ProgressEvent, ProgressFanout, ProgressSink};

use crate::fetcher::FetcherError;
use crate::output::OutputError;
use crate::store::StoreError;
use serde::Serialize;
use std::path::PathBuf;

/// Export errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Remote retrieval failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetcherError),

    /// Retrieved data could not be interpreted
    #[error("data format error: {0}")]
    DataFormat(#[from] StoreError),

    /// Local output failed
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// The run was cancelled
    #[error("export cancelled")]
    Cancelled,

    /// The user declined to overwrite existing output
    #[error("overwrite of existing output declined")]
    OverwriteDeclined,

    /// The job has already been run
    #[error("export job already {0}")]
    AlreadyRun(ExportStatus),

    /// Job parameters are unusable
    #[error("invalid export job: {0}")]
    InvalidJob(String),

    /// Background task failed to complete
    #[error("export task failed: {0}")]
    TaskFailed(String),
}

impl ExportError {
    /// Classify the error by origin
    pub fn kind(&self) -> FailureKind {
        match self {
            ExportError::Fetch(_) => FailureKind::RemoteFetch,
            ExportError::DataFormat(_) => FailureKind::DataFormat,
            ExportError::Output(_) => FailureKind::Write,
            ExportError::Cancelled
            | ExportError::OverwriteDeclined
            | ExportError::AlreadyRun(_)
            | ExportError::InvalidJob(_)
            | ExportError::TaskFailed(_) => FailureKind::Generic,
        }
    }
}

/// Failure classes reported to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network or protocol failure while paginating
    RemoteFetch,
    /// A row or page could not be interpreted
    DataFormat,
    /// Local IO failure while writing output
    Write,
    /// Cancellation or anything unclassified
    Generic,
}

impl FailureKind {
    /// Fixed user-facing message for this class
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::RemoteFetch => {
                "Unable to retrieve data from the server. Check the server address and try again."
            }
            FailureKind::DataFormat => "Retrieved data could not be formatted as rows.",
            FailureKind::Write => "Unable to write the CSV file to disk.",
            FailureKind::Generic => "The export did not complete.",
        }
    }

    /// Short label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RemoteFetch => "remote_fetch",
            FailureKind::DataFormat => "data_format",
            FailureKind::Write => "write",
            FailureKind::Generic => "generic",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one export run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// CSV fully written
    Success {
        /// Data rows written (header excluded)
        rows_written: usize,
        /// Where the file was written
        output_path: PathBuf,
    },
    /// Run aborted
    Failure {
        /// Origin of the failure
        kind: FailureKind,
        /// Detailed message
        message: String,
    },
}

impl ExportOutcome {
    /// Build a failure outcome from an error
    pub fn from_error(error: &ExportError) -> Self {
        ExportOutcome::Failure {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Whether the run succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, ExportOutcome::Success { .. })
    }

    /// Failure class, if the run failed
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ExportOutcome::Success { .. } => None,
            ExportOutcome::Failure { kind, .. } => Some(*kind),
        }
    }
}
