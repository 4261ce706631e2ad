//! CSV output and filesystem policy

pub mod csv;
pub mod path;

pub use self::csv::{write_csv_file, write_rows, CsvTableWriter};
pub use path::{ExportTarget, LocalOutputPolicy, OutputPolicy};

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
