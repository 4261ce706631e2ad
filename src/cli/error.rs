//! CLI error types and conversions

use crate::ConfigError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration file or endpoint could not be used
    #[error("configuration error: {0}")]
    ConfigurationError(#[from] ConfigError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClientError(String),
}
