//! Top-level transfer flow
//!
//! Decides the direction, resolves both arguments, plans every job, runs the
//! plan through the worker pool and aggregates the results. Anything that
//! fails before transfers start is fatal; after that, failures are per job.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::job::{AggregateOutcome, Direction, TransferJob, TransferRequest};
use crate::locator::{classify_local_path, is_storage_uri, resolve_storage_uri};
use crate::planner::JobPlanner;
use crate::pool::WorkerPool;
use crate::storage::ObjectStore;
use crate::transfer::Transferor;

/// Orchestration phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Resolving,
    Planning,
    Transferring,
    Aggregating,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Resolving => "resolving",
            Phase::Planning => "planning",
            Phase::Transferring => "transferring",
            Phase::Aggregating => "aggregating",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Current phase of one run, logging every transition
struct PhaseTracker {
    current: Phase,
}

impl PhaseTracker {
    fn new() -> Self {
        debug!(phase = %Phase::Init, "Transfer phase");
        Self {
            current: Phase::Init,
        }
    }

    fn enter(&mut self, next: Phase) {
        debug!(from = %self.current, to = %next, "Transfer phase");
        self.current = next;
    }

    fn fail(&mut self, error: &TransferError) {
        debug!(
            from = %self.current,
            to = %Phase::Failed,
            failed_in = %error.phase(),
            "Transfer phase: {}",
            error
        );
        self.current = Phase::Failed;
    }
}

/// Runs copies between local paths and object storage
pub struct TransferOrchestrator {
    config: TransferConfig,
    store: Arc<dyn ObjectStore>,
}

impl TransferOrchestrator {
    pub fn new(config: TransferConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self { config, store }
    }

    /// Copy `source_arg` to `dest_arg`
    ///
    /// Exactly one of the two must be a storage URI. Returns an error only
    /// when the run could not start; per-job failures are reported in the
    /// returned outcome.
    pub async fn run(
        &self,
        source_arg: &str,
        dest_arg: &str,
    ) -> Result<AggregateOutcome, TransferError> {
        let mut phase = PhaseTracker::new();
        let jobs = match self.prepare(source_arg, dest_arg, &mut phase).await {
            Ok(jobs) => jobs,
            Err(e) => {
                phase.fail(&e);
                return Err(e);
            }
        };

        phase.enter(Phase::Transferring);
        let executor = Arc::new(Transferor::new(self.store.clone()));
        let pool = WorkerPool::new(executor, self.config.effective_parallelism());
        let results = pool.submit_all(jobs).await;

        phase.enter(Phase::Aggregating);
        let outcome = AggregateOutcome::from_results(results);

        phase.enter(Phase::Done);
        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed.len(),
            bytes = outcome.bytes_transferred,
            "Transfer finished"
        );

        Ok(outcome)
    }

    /// Resolve and plan without transferring anything
    pub async fn plan_only(
        &self,
        source_arg: &str,
        dest_arg: &str,
    ) -> Result<Vec<TransferJob>, TransferError> {
        let mut phase = PhaseTracker::new();
        match self.prepare(source_arg, dest_arg, &mut phase).await {
            Ok(jobs) => {
                phase.enter(Phase::Done);
                Ok(jobs)
            }
            Err(e) => {
                phase.fail(&e);
                Err(e)
            }
        }
    }

    async fn prepare(
        &self,
        source_arg: &str,
        dest_arg: &str,
        phase: &mut PhaseTracker,
    ) -> Result<Vec<TransferJob>, TransferError> {
        let direction = transfer_direction(source_arg, dest_arg)?;

        phase.enter(Phase::Resolving);
        let request = match direction {
            Direction::Upload => resolve_upload(source_arg, dest_arg)?,
            Direction::Download => resolve_download(source_arg, dest_arg)?,
        };

        phase.enter(Phase::Planning);
        let jobs = JobPlanner::new(self.store.clone()).plan(&request).await?;

        Ok(jobs)
    }
}

/// Direction implied by which argument is a storage URI
pub fn transfer_direction(source_arg: &str, dest_arg: &str) -> Result<Direction, TransferError> {
    match (is_storage_uri(source_arg), is_storage_uri(dest_arg)) {
        (false, true) => Ok(Direction::Upload),
        (true, false) => Ok(Direction::Download),
        (false, false) => Err(TransferError::NoStorageUri {
            source_arg: source_arg.to_string(),
            dest_arg: dest_arg.to_string(),
        }),
        (true, true) => Err(TransferError::BothStorageUris {
            source_arg: source_arg.to_string(),
            dest_arg: dest_arg.to_string(),
        }),
    }
}

/// Validate both arguments without touching the filesystem or storage
///
/// Catches every invocation mistake `run` would report: an ambiguous
/// direction or a malformed storage URI.
pub fn check_arguments(source_arg: &str, dest_arg: &str) -> Result<Direction, TransferError> {
    let direction = transfer_direction(source_arg, dest_arg)?;
    let uri = match direction {
        Direction::Upload => dest_arg,
        Direction::Download => source_arg,
    };
    resolve_storage_uri(uri)?;
    Ok(direction)
}

fn resolve_upload(source_arg: &str, dest_arg: &str) -> Result<TransferRequest, TransferError> {
    let destination = resolve_storage_uri(dest_arg)?;
    let source = classify_local_path(source_arg).map_err(|e| TransferError::Source {
        path: PathBuf::from(source_arg),
        source: e,
    })?;

    debug!(source = %source.path().display(), destination = %destination, "Resolved upload");

    Ok(TransferRequest::Upload {
        source: source.path().to_path_buf(),
        destination,
    })
}

fn resolve_download(source_arg: &str, dest_arg: &str) -> Result<TransferRequest, TransferError> {
    let source = resolve_storage_uri(source_arg)?;

    debug!(source = %source, destination = dest_arg, "Resolved download");

    Ok(TransferRequest::Download {
        source,
        destination: PathBuf::from(dest_arg),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::PlanError;
    use crate::storage::MemoryStore;
    use tempfile::TempDir;

    fn orchestrator(store: &Arc<MemoryStore>) -> TransferOrchestrator {
        TransferOrchestrator::new(TransferConfig::new().with_parallelism(2), store.clone())
    }

    #[tokio::test]
    async fn test_neither_argument_is_storage_uri() {
        let store = Arc::new(MemoryStore::new());
        let err = orchestrator(&store).run("a", "b").await.unwrap_err();

        assert!(matches!(err, TransferError::NoStorageUri { .. }));
        assert_eq!(err.phase(), Phase::Init);
    }

    #[tokio::test]
    async fn test_both_arguments_are_storage_uris() {
        let store = Arc::new(MemoryStore::new());
        let err = orchestrator(&store)
            .run("s3://a/x", "s3://b/y")
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::BothStorageUris { .. }));
        assert!(err.is_usage());
    }

    #[tokio::test]
    async fn test_missing_upload_source_fails_resolving() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let missing = dir.path().join("missing");

        let err = orchestrator(&store)
            .run(missing.to_str().unwrap(), "s3://bucket/key")
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Source { .. }));
        assert_eq!(err.phase(), Phase::Resolving);
    }

    #[tokio::test]
    async fn test_empty_bucket_is_locator_error() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());

        let err = orchestrator(&store)
            .run("s3:///key", dir.path().to_str().unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Locator(_)));
    }

    #[tokio::test]
    async fn test_upload_single_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        let store = Arc::new(MemoryStore::new());

        let outcome = orchestrator(&store)
            .run(path.to_str().unwrap(), "s3://bucket/")
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.bytes_transferred, 8);
        assert_eq!(store.keys("bucket"), vec!["report.csv"]);
    }

    #[tokio::test]
    async fn test_download_plan_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.fail_list();

        let err = orchestrator(&store)
            .run("s3://bucket/logs/*", dir.path().to_str().unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Plan(PlanError::List { .. })));
        assert_eq!(err.phase(), Phase::Planning);
    }

    #[tokio::test]
    async fn test_plan_only_transfers_nothing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        let store = Arc::new(MemoryStore::new());

        let jobs = orchestrator(&store)
            .plan_only(dir.path().to_str().unwrap(), "s3://bucket/backup")
            .await
            .unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].locator().key(), "backup/a.txt");
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_job_failures_are_reported_not_raised() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("c.txt"), "c").unwrap();
        let store = Arc::new(MemoryStore::new());
        store.fail_put("b.txt");

        let outcome = orchestrator(&store)
            .run(dir.path().to_str().unwrap(), "s3://bucket")
            .await
            .unwrap();

        assert_eq!(outcome.total(), 3);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].job.locator().key(), "b.txt");
        assert_eq!(store.keys("bucket"), vec!["a.txt", "c.txt"]);
    }

    #[test]
    fn test_check_arguments() {
        assert_eq!(
            check_arguments("./data", "s3://bucket/data").unwrap(),
            Direction::Upload
        );
        assert_eq!(
            check_arguments("s3://bucket/logs/*", "./out").unwrap(),
            Direction::Download
        );

        let err = check_arguments("a.txt", "b.txt").unwrap_err();
        assert!(matches!(err, TransferError::NoStorageUri { .. }));
        assert!(err.is_usage());

        let err = check_arguments("a.txt", "s3:///key").unwrap_err();
        assert!(matches!(err, TransferError::Locator(_)));
        assert!(err.is_usage());
    }

    #[test]
    fn test_check_arguments_does_no_io() {
        // Neither path exists; only the argument shape is checked
        assert!(check_arguments("/definitely/missing/source", "s3://bucket").is_ok());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Transferring.to_string(), "transferring");
        assert_eq!(Phase::Failed.to_string(), "failed");
    }
}
