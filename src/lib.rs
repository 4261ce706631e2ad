//! # Table CSV Exporter Library
//!
//! Exports the rows of a remote, cursor-paginated table endpoint into a single
//! well-formed CSV file, reporting progress along the way and classifying any
//! failure by where it happened.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use table_csv_exporter::exporter::{ExportExecutor, ExportJob, LogProgress};
//! use table_csv_exporter::fetcher::http::HttpRowSource;
//! use table_csv_exporter::output::LocalOutputPolicy;
//! use table_csv_exporter::store::RowStore;
//! use table_csv_exporter::{EndpointInfo, FormatConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = EndpointInfo::parse("https://sync.example.org", "default")?;
//! let source = HttpRowSource::new(reqwest::Client::new(), &endpoint);
//!
//! let executor = ExportExecutor::new(Arc::new(source), Arc::new(LocalOutputPolicy))
//!     .with_progress(Arc::new(LogProgress));
//!
//! let job = ExportJob::new(endpoint, "census", FormatConfig::default(), "./exports");
//! let task = executor.spawn(job, RowStore::new("census"));
//! let outcome = task.wait().await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`store`] - In-memory row store with cached header derivation
//! - [`fetcher`] - Endpoint abstraction and cursor pagination
//! - [`output`] - CSV serialization and output path policy
//! - [`exporter`] - Export orchestration, progress events and outcomes
//! - [`shutdown`] - Cancellation shared between the CLI and running exports
//! - [`cli`] - Command line front end

#![warn(missing_docs)]
#![warn(clippy::all)]

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// CLI command implementations
pub mod cli;

/// Export orchestration
pub mod exporter;

/// Remote row retrieval
pub mod fetcher;

/// Export metrics
pub mod metrics;

/// CSV output and filesystem policy
pub mod output;

/// Cancellation coordination shared across modules
pub mod shutdown;

/// In-memory row storage
pub mod store;

pub use exporter::{ExportExecutor, ExportJob, ExportOutcome, FailureKind, ProgressEvent};
pub use store::RowStore;

/// Prefix that marks a column as row metadata rather than user data.
pub const METADATA_PREFIX: char = '_';

/// Whether a column holds row metadata (e.g. `_id`, `_savepoint_timestamp`).
pub fn is_metadata_column(name: &str) -> bool {
    name.starts_with(METADATA_PREFIX)
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that failed
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Config file is not valid JSON for the expected shape
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File that failed
        path: String,
        /// Underlying JSON error
        source: serde_json::Error,
    },

    /// Values parsed but are not usable
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Remote endpoint coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    /// Server base URL, without a trailing slash
    pub base_url: String,
    /// Application identifier on the server
    pub app_id: String,
}

impl EndpointInfo {
    /// Parse and validate a server URL and application id.
    pub fn parse(base_url: &str, app_id: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(base_url.trim())
            .map_err(|e| ConfigError::Invalid(format!("bad server URL {base_url:?}: {e}")))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Invalid(format!(
                "server URL must be http or https, got {}",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::Invalid(format!(
                "server URL has no host: {base_url}"
            )));
        }

        let app_id = app_id.trim();
        if app_id.is_empty() {
            return Err(ConfigError::Invalid("app id cannot be empty".to_string()));
        }

        Ok(Self {
            base_url: url.as_str().trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
        })
    }

    /// Host component of the base URL, used for output directory layout.
    pub fn host(&self) -> String {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.base_url.clone())
    }
}

/// Controls how the header and each row are rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Explicit ordered column list; derived from the data when absent
    pub columns: Option<Vec<String>>,
    /// Keep `_`-prefixed metadata columns when deriving the header
    pub include_metadata: bool,
    /// Text written for null or missing values
    pub null_value: String,
    /// Fail a row that lacks one of the header columns
    pub strict_columns: bool,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            columns: None,
            include_metadata: false,
            null_value: String::new(),
            strict_columns: false,
        }
    }
}

impl FormatConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let config: FormatConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Validate config values
    pub fn validate(&self) -> Result<(), String> {
        if let Some(columns) = &self.columns {
            if columns.is_empty() {
                return Err("Explicit column list cannot be empty".to_string());
            }

            let mut seen = HashSet::new();
            for column in columns {
                if column.is_empty() {
                    return Err("Column names cannot be empty".to_string());
                }
                if !seen.insert(column.as_str()) {
                    return Err(format!("Duplicate column: {column}"));
                }
            }
        }

        Ok(())
    }

    /// Variant tag used in output file names.
    pub fn variant(&self) -> &'static str {
        if self.include_metadata {
            "full"
        } else {
            "data"
        }
    }
}

/// One retrieved row: column name to raw value, in received column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<(String, Option<String>)>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, column: &str, value: Option<&str>) -> Self {
        self.insert(column.to_string(), value.map(str::to_string));
        self
    }

    /// Build a row from cells whose column names are already unique.
    pub(crate) fn from_unique_cells(cells: Vec<(String, Option<String>)>) -> Self {
        Self { cells }
    }

    /// Set a cell, replacing any earlier value for the same column.
    pub fn insert(&mut self, column: String, value: Option<String>) {
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    /// Whether the row carries the column at all (null counts as present).
    pub fn contains(&self, column: &str) -> bool {
        self.cells.iter().any(|(name, _)| name == column)
    }

    /// Non-null value of a column
    pub fn value(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Column names in received order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
