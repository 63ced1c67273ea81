//! Transfer job descriptors and their results

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::JobError;
use crate::locator::StorageLocator;

/// Which way bytes flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local filesystem to object storage
    Upload,
    /// Object storage to local filesystem
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => write!(f, "upload"),
            Direction::Download => write!(f, "download"),
        }
    }
}

/// A resolved source/destination pair, ready for planning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferRequest {
    Upload {
        /// Canonical local file or directory
        source: PathBuf,
        destination: StorageLocator,
    },
    Download {
        source: StorageLocator,
        /// Destination as given by the caller; may not exist yet
        destination: PathBuf,
    },
}

impl TransferRequest {
    pub fn direction(&self) -> Direction {
        match self {
            TransferRequest::Upload { .. } => Direction::Upload,
            TransferRequest::Download { .. } => Direction::Download,
        }
    }
}

/// One file, one direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "direction", rename_all = "lowercase")]
pub enum TransferJob {
    Upload {
        source: PathBuf,
        destination: StorageLocator,
    },
    Download {
        source: StorageLocator,
        destination: PathBuf,
    },
}

impl TransferJob {
    pub fn upload(source: impl Into<PathBuf>, destination: StorageLocator) -> Self {
        TransferJob::Upload {
            source: source.into(),
            destination,
        }
    }

    pub fn download(source: StorageLocator, destination: impl Into<PathBuf>) -> Self {
        TransferJob::Download {
            source,
            destination: destination.into(),
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            TransferJob::Upload { .. } => Direction::Upload,
            TransferJob::Download { .. } => Direction::Download,
        }
    }

    /// The local side of the job, whichever direction it runs
    pub fn local_path(&self) -> &Path {
        match self {
            TransferJob::Upload { source, .. } => source,
            TransferJob::Download { destination, .. } => destination,
        }
    }

    /// The object-storage side of the job
    pub fn locator(&self) -> &StorageLocator {
        match self {
            TransferJob::Upload { destination, .. } => destination,
            TransferJob::Download { source, .. } => source,
        }
    }
}

impl fmt::Display for TransferJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferJob::Upload {
                source,
                destination,
            } => write!(f, "{} -> {}", source.display(), destination),
            TransferJob::Download {
                source,
                destination,
            } => write!(f, "{} -> {}", source, destination.display()),
        }
    }
}

/// Outcome of one job: bytes moved, or why it failed
pub type JobOutcome = Result<u64, JobError>;

/// A job paired with its outcome
#[derive(Debug)]
pub struct TransferResult {
    pub job: TransferJob,
    pub outcome: JobOutcome,
}

impl TransferResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// A failed job and its cause
#[derive(Debug)]
pub struct JobFailure {
    pub job: TransferJob,
    pub error: JobError,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.job, self.error)
    }
}

/// Aggregated result of a run
///
/// Failures are kept in submission order, independent of completion timing.
#[derive(Debug, Default)]
pub struct AggregateOutcome {
    pub succeeded: usize,
    pub bytes_transferred: u64,
    pub failed: Vec<JobFailure>,
}

impl AggregateOutcome {
    /// Fold results, which must already be in submission order
    pub fn from_results(results: impl IntoIterator<Item = TransferResult>) -> Self {
        let mut outcome = Self::default();
        for result in results {
            outcome.record(result);
        }
        outcome
    }

    pub fn record(&mut self, result: TransferResult) {
        match result.outcome {
            Ok(bytes) => {
                self.succeeded += 1;
                self.bytes_transferred += bytes;
            }
            Err(error) => self.failed.push(JobFailure {
                job: result.job,
                error,
            }),
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
