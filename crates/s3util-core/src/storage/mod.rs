//! Object-storage capability
//!
//! The orchestration core only talks to storage through [`ObjectStore`].
//! [`S3Store`] backs it with the AWS SDK. With the `test-util` feature,
//! [`MemoryStore`] keeps objects in a map for tests.

use anyhow::Result;
use async_trait::async_trait;
use std::pin::Pin;
use tokio::fs::File;
use tokio::io::AsyncRead;

pub mod config;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod s3;

pub use config::StorageConfig;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use s3::S3Store;

/// Streaming object body
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Storage client shared read-only by every transfer worker
///
/// Implementations must be safe for concurrent invocation. Retries and
/// multipart chunking, if any, happen behind this trait.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store the contents of `body` at `bucket/key`
    ///
    /// `content_length` is the size of `body` when it was opened. The file is
    /// streamed, never read into memory as a whole.
    async fn put(&self, bucket: &str, key: &str, body: File, content_length: u64) -> Result<()>;

    /// Open a stream over the object at `bucket/key`
    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectReader>;

    /// All keys in `bucket` starting with the literal `prefix`
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;
}
