//! Bounded worker pool
//!
//! A fixed number of worker tasks drain a shared queue of jobs. Every job is
//! handed to exactly one worker, and every job gets exactly one result slot.
//! [`WorkerPool::submit_all`] returns only after every slot is filled.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::JobError;
use crate::job::{JobOutcome, TransferJob, TransferResult};

/// Performs a single transfer
#[async_trait]
pub trait TransferExecutor: Send + Sync {
    /// Move one file and report the bytes transferred
    ///
    /// Failures are returned, never raised; a panic is caught by the pool and
    /// reported as [`JobError::Aborted`] for this job alone.
    async fn transfer_one(&self, job: &TransferJob) -> JobOutcome;
}

type Queue = Arc<Mutex<mpsc::UnboundedReceiver<(TransferJob, oneshot::Sender<JobOutcome>)>>>;

/// Fan-out/fan-in executor with independent failure per job
pub struct WorkerPool {
    executor: Arc<dyn TransferExecutor>,
    workers: usize,
}

impl WorkerPool {
    /// Pool with `parallelism` workers, at least one
    pub fn new(executor: Arc<dyn TransferExecutor>, parallelism: usize) -> Self {
        Self {
            executor,
            workers: parallelism.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every job and return one result per job, in submission order
    pub async fn submit_all(&self, jobs: Vec<TransferJob>) -> Vec<TransferResult> {
        if jobs.is_empty() {
            return Vec::new();
        }

        let workers = self.workers.min(jobs.len());
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: Queue = Arc::new(Mutex::new(receiver));

        let mut pending = Vec::with_capacity(jobs.len());
        for job in jobs {
            let (slot, result) = oneshot::channel();
            pending.push((job.clone(), result));
            // `queue` holds the receiver, so the send cannot fail
            sender.send((job, slot)).ok();
        }
        drop(sender);

        debug!(jobs = pending.len(), workers, "Starting worker pool");

        let mut tasks = JoinSet::new();
        for worker in 0..workers {
            tasks.spawn(run_worker(worker, queue.clone(), self.executor.clone()));
        }
        // Workers own the queue from here on; if all of them die, queued
        // slots are dropped instead of waiting forever
        drop(queue);

        let mut results = Vec::with_capacity(pending.len());
        for (job, result) in pending {
            let outcome = result.await.unwrap_or_else(|_| {
                Err(JobError::Aborted(
                    "worker exited before completing the job".to_string(),
                ))
            });
            results.push(TransferResult { job, outcome });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Transfer worker terminated abnormally: {}", e);
            }
        }

        results
    }
}

async fn run_worker(worker: usize, queue: Queue, executor: Arc<dyn TransferExecutor>) {
    loop {
        // Lock is released before the job runs
        let next = queue.lock().await.recv().await;
        let Some((job, slot)) = next else {
            break;
        };

        debug!(worker, job = %job, "Starting transfer");

        let outcome = AssertUnwindSafe(executor.transfer_one(&job))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(JobError::Aborted(panic_message(panic.as_ref()))));

        match &outcome {
            Ok(bytes) => debug!(worker, job = %job, bytes, "Transfer complete"),
            Err(e) => debug!(worker, job = %job, "Transfer failed: {}", e),
        }

        if slot.send(outcome).is_err() {
            warn!(worker, job = %job, "Result receiver dropped");
        }
    }

    debug!(worker, "Worker finished");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("transfer panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("transfer panicked: {}", message)
    } else {
        "transfer panicked".to_string()
    }
}
