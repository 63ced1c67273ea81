//! Error types for transfer orchestration
//!
//! Errors are split by where they stop propagating:
//!
//! - [`LocatorError`] and [`PlanError`] are fatal and abort a run before any
//!   transfer starts.
//! - [`JobError`] is recorded against a single job and never escapes the
//!   worker that produced it.
//! - [`TransferError`] is the fatal error returned by
//!   [`TransferOrchestrator::run`](crate::orchestrator::TransferOrchestrator::run).

use std::path::PathBuf;
use thiserror::Error;

use crate::locator::StorageLocator;
use crate::orchestrator::Phase;

/// A storage URI could not be resolved into a bucket and key
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    #[error("'{0}' is not a storage URI (expected s3://bucket[/key])")]
    NotStorageUri(String),

    #[error("storage URI '{0}' does not name a bucket")]
    EmptyBucket(String),
}

/// Planning failed; no job list is produced
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("failed to walk source directory '{root}': {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to stat '{path}': {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list {locator}: {source:#}")]
    List {
        locator: StorageLocator,
        #[source]
        source: anyhow::Error,
    },

    #[error("destination '{0}' must be an existing directory for a wildcard download")]
    DestinationNotDirectory(PathBuf),

    #[error("{0} does not name an object; use a key or a trailing '*' to download a prefix")]
    MissingKey(StorageLocator),

    #[error("refusing to download key '{key}': it would be written outside '{destination}'")]
    UnsafeKey { key: String, destination: PathBuf },

    #[error("planning task was interrupted: {0}")]
    Interrupted(String),
}

/// One transfer failed; siblings are unaffected
#[derive(Error, Debug)]
pub enum JobError {
    #[error("failed to read source file '{path}': {source}")]
    OpenSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to upload '{path}' to {locator}: {source:#}")]
    Upload {
        path: PathBuf,
        locator: StorageLocator,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to download {locator}: {source:#}")]
    Download {
        locator: StorageLocator,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to create destination file '{path}': {source}")]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to copy {locator} into '{path}': {source}")]
    Copy {
        locator: StorageLocator,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transfer worker stopped before reporting a result: {0}")]
    Aborted(String),
}

/// Fatal error for a whole run
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("one of the paths must be an S3 URI (s3://bucket[/key]); got '{source_arg}' and '{dest_arg}'")]
    NoStorageUri { source_arg: String, dest_arg: String },

    #[error("only one of the paths may be an S3 URI; got '{source_arg}' and '{dest_arg}'")]
    BothStorageUris { source_arg: String, dest_arg: String },

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error("failed to stat input path '{path}': {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("failed to initialize storage client: {0:#}")]
    StorageInit(#[source] anyhow::Error),
}

impl TransferError {
    /// Orchestration phase in which the run failed
    pub fn phase(&self) -> Phase {
        match self {
            TransferError::NoStorageUri { .. }
            | TransferError::BothStorageUris { .. }
            | TransferError::StorageInit(_) => Phase::Init,
            TransferError::Locator(_) | TransferError::Source { .. } => Phase::Resolving,
            TransferError::Plan(_) => Phase::Planning,
        }
    }

    /// Whether the error was caused by how the tool was invoked
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            TransferError::NoStorageUri { .. }
                | TransferError::BothStorageUris { .. }
                | TransferError::Locator(_)
        )
    }
}
