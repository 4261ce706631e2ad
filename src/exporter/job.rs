//! Export job structures and status tracking

use crate::{EndpointInfo, FormatConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle of a single export job.
///
/// `Idle -> Running -> {Succeeded | Failed}`; terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExportStatus {
    /// Not started yet
    #[default]
    Idle,
    /// Currently running
    Running,
    /// Finished successfully
    Succeeded,
    /// Finished with a failure
    Failed,
}

impl ExportStatus {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExportStatus::Succeeded | ExportStatus::Failed)
    }
}

impl std::fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExportStatus::Idle => "idle",
            ExportStatus::Running => "running",
            ExportStatus::Succeeded => "succeeded",
            ExportStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Everything needed to export one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    /// Server the table lives on
    pub endpoint: EndpointInfo,
    /// Remote table identifier
    pub table_id: String,
    /// Header and row formatting
    pub config: FormatConfig,
    /// Root directory for exported files
    pub save_dir: PathBuf,
    /// Whether a person can answer prompts
    pub interactive: bool,
    /// Current job status
    #[serde(default)]
    pub status: ExportStatus,
}

impl ExportJob {
    /// Create a headless export job
    pub fn new(
        endpoint: EndpointInfo,
        table_id: impl Into<String>,
        config: FormatConfig,
        save_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            endpoint,
            table_id: table_id.into(),
            config,
            save_dir: save_dir.into(),
            interactive: false,
            status: ExportStatus::Idle,
        }
    }

    /// Mark the job as interactive (prompts may be answered by a person)
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Validate job parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.table_id.trim().is_empty() {
            return Err("Table id cannot be empty".to_string());
        }

        if self.table_id.contains(['/', '\\']) || self.table_id.contains("..") {
            return Err(format!(
                "Table id contains path characters: {}",
                self.table_id
            ));
        }

        self.config.validate()
    }

    /// Move `Idle -> Running`.
    ///
    /// # Errors
    /// Returns the current status if the job is not idle.
    pub fn start(&mut self) -> Result<(), ExportStatus> {
        if self.status != ExportStatus::Idle {
            return Err(self.status);
        }
        self.status = ExportStatus::Running;
        Ok(())
    }

    /// Move `Running -> Succeeded | Failed`.
    pub fn finish(&mut self, success: bool) {
        if self.status == ExportStatus::Running {
            self.status = if success {
                ExportStatus::Succeeded
            } else {
                ExportStatus::Failed
            };
        }
    }
}
