//! Output location policy
//!
//! Exports are laid out as `{save_dir}/{host}/{app_id}/{table_id}/{table_id}-{variant}.csv`
//! where `variant` is `data` or `full` depending on whether metadata columns
//! are included. Every path component is sanitized so a hostile table id
//! cannot escape the save directory.
//!
//! ```rust
//! use table_csv_exporter::output::ExportTarget;
//! use table_csv_exporter::{EndpointInfo, FormatConfig};
//!
//! let endpoint = EndpointInfo::parse("https://sync.example.org", "default").unwrap();
//! let target = ExportTarget::new("exports", &endpoint, "census", &FormatConfig::default());
//! assert!(target.csv_path().ends_with("sync.example.org/default/census/census-data.csv"));
//! ```

use super::{OutputError, OutputResult};
use crate::{EndpointInfo, FormatConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where one table's export lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    save_dir: PathBuf,
    host: String,
    app_id: String,
    table_id: String,
    variant: &'static str,
}

impl ExportTarget {
    /// Describe the export location for a table
    pub fn new(
        save_dir: impl Into<PathBuf>,
        endpoint: &EndpointInfo,
        table_id: &str,
        config: &FormatConfig,
    ) -> Self {
        Self {
            save_dir: save_dir.into(),
            host: sanitize_component(&endpoint.host()),
            app_id: sanitize_component(&endpoint.app_id),
            table_id: sanitize_component(table_id),
            variant: config.variant(),
        }
    }

    /// Directory holding the table's exports
    pub fn table_dir(&self) -> PathBuf {
        self.save_dir
            .join(&self.host)
            .join(&self.app_id)
            .join(&self.table_id)
    }

    /// Full CSV file path
    pub fn csv_path(&self) -> PathBuf {
        self.table_dir()
            .join(format!("{}-{}.csv", self.table_id, self.variant))
    }
}

/// Decides where output goes and manages what is already there
pub trait OutputPolicy: Send + Sync {
    /// Path the CSV is written to
    fn resolve_csv_path(&self, target: &ExportTarget) -> PathBuf;

    /// Whether a previous export exists
    fn exists(&self, target: &ExportTarget) -> bool;

    /// Remove a previous export
    fn delete(&self, target: &ExportTarget) -> OutputResult<()>;

    /// Create the directory structure for the export
    fn create_dirs(&self, target: &ExportTarget) -> OutputResult<()>;
}

/// Policy backed by the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalOutputPolicy;

impl OutputPolicy for LocalOutputPolicy {
    fn resolve_csv_path(&self, target: &ExportTarget) -> PathBuf {
        target.csv_path()
    }

    fn exists(&self, target: &ExportTarget) -> bool {
        target.csv_path().is_file()
    }

    fn delete(&self, target: &ExportTarget) -> OutputResult<()> {
        let path = target.csv_path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed previous export: {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OutputError::IoError(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn create_dirs(&self, target: &ExportTarget) -> OutputResult<()> {
        let dir = target.table_dir();
        ensure_dir(&dir)?;
        debug!("Export directory ready: {}", dir.display());
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> OutputResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        OutputError::IoError(format!(
            "Failed to create directory {}: {}",
            dir.display(),
            e
        ))
    })
}

/// Sanitize a path component for filesystem safety
///
/// - `/`, `\`, `:` → `_`
/// - `..` → `__`
/// - empty → `_`
fn sanitize_component(name: &str) -> String {
    let cleaned = name.replace("..", "__").replace(['/', '\\', ':'], "_");
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
