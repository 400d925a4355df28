//! CLI error types and conversions

use crate::client::ApiError;
use crate::extract::ExtractError;
use crate::output::OutputError;
use crate::resume::CheckpointError;

/// CLI errors.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// API client error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Extraction error
    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// Checkpoint store error
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Output writer error
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}
