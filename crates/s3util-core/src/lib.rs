//! s3util core library
//!
//! Copies single files, directory trees and wildcard prefixes between the
//! local filesystem and S3-compatible object storage.
//!
//! - [`locator`] parses `s3://bucket/key` arguments and classifies local paths
//! - [`planner`] expands a request into individual [`job::TransferJob`]s
//! - [`pool`] runs jobs on a bounded set of workers
//! - [`orchestrator`] ties the phases together and aggregates results
//! - [`storage`] abstracts the object store behind [`storage::ObjectStore`]

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod job;
pub mod locator;
pub mod orchestrator;
pub mod planner;
pub mod pool;
pub mod storage;
pub mod transfer;

pub use config::TransferConfig;
pub use error::{JobError, LocatorError, PlanError, TransferError};
pub use job::{AggregateOutcome, Direction, JobFailure, TransferJob, TransferRequest, TransferResult};
pub use locator::{resolve_storage_uri, LocalPath, StorageLocator};
pub use orchestrator::{check_arguments, Phase, TransferOrchestrator};
pub use storage::{ObjectStore, S3Store, StorageConfig};

#[cfg(any(test, feature = "test-util"))]
pub use storage::MemoryStore;
