//! Error types for the s3util CLI
//!
//! Every error maps to a process exit code: 2 for invocation mistakes, 1 for
//! everything else.

use s3util_core::TransferError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Exit code for a run in which something failed
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for invalid invocations, matching clap's own usage errors
pub const EXIT_USAGE: i32 = 2;

#[derive(Error, Debug)]
pub enum CliError {
    /// Arguments parsed but do not describe a valid copy
    #[error("{0}")]
    Usage(String),

    /// The run could not start
    #[error(transparent)]
    Transfer(TransferError),

    /// Flags or environment produced an invalid configuration
    #[error("Configuration error: {0}. Check the command-line flags and S3UTIL_* environment variables.")]
    Config(String),

    /// The run finished but some jobs failed; details were already reported
    #[error("{failed} of {total} transfers failed")]
    JobsFailed { failed: usize, total: usize },

    /// Writing the report failed
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    /// JSON report serialization failed
    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }

    /// Whether the message still needs printing; per-job failures are
    /// printed as they are aggregated
    pub fn needs_report(&self) -> bool {
        !matches!(self, CliError::JobsFailed { .. })
    }
}

impl From<TransferError> for CliError {
    fn from(error: TransferError) -> Self {
        if error.is_usage() {
            CliError::Usage(error.to_string())
        } else {
            CliError::Transfer(error)
        }
    }
}
