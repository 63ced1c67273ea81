use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::{ObjectReader, ObjectStore};

#[derive(Default)]
struct State {
    objects: BTreeMap<(String, String), Vec<u8>>,
    failing_puts: HashSet<String>,
    failing_gets: HashSet<String>,
    fail_list: bool,
    puts: usize,
}

/// In-memory [`ObjectStore`] with per-key failure injection
///
/// Like S3, `put` rejects a body whose size differs from the declared
/// content length.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object
    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.state()
            .objects
            .insert((bucket.to_string(), key.to_string()), data.into());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Every stored key in `bucket`, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Successful `put` calls so far
    pub fn put_count(&self) -> usize {
        self.state().puts
    }

    /// Make `put` fail for `key`
    pub fn fail_put(&self, key: &str) {
        self.state().failing_puts.insert(key.to_string());
    }

    /// Make `get` fail for `key`
    pub fn fail_get(&self, key: &str) {
        self.state().failing_gets.insert(key.to_string());
    }

    /// Make every `list` call fail
    pub fn fail_list(&self) {
        self.state().fail_list = true;
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, bucket: &str, key: &str, mut body: File, content_length: u64) -> Result<()> {
        if self.state().failing_puts.contains(key) {
            return Err(anyhow!("injected put failure for s3://{}/{}", bucket, key));
        }

        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        if data.len() as u64 != content_length {
            bail!(
                "body of {} bytes does not match content length {} for s3://{}/{}",
                data.len(),
                content_length,
                bucket,
                key
            );
        }

        let mut state = self.state();
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), data);
        state.puts += 1;
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        let state = self.state();
        if state.failing_gets.contains(key) {
            return Err(anyhow!("injected get failure for s3://{}/{}", bucket, key));
        }

        let data = state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("NoSuchKey: s3://{}/{}", bucket, key))?;

        Ok(Box::pin(std::io::Cursor::new(data)))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let state = self.state();
        if state.fail_list {
            return Err(anyhow!("injected list failure for s3://{}/{}", bucket, prefix));
        }

        Ok(state
            .objects
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }
}
