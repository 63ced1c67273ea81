//! Per-job transfers between the local filesystem and object storage

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::error::JobError;
use crate::job::{JobOutcome, TransferJob};
use crate::locator::StorageLocator;
use crate::pool::TransferExecutor;
use crate::storage::{ObjectReader, ObjectStore};

/// Moves single files through an [`ObjectStore`]
pub struct Transferor {
    store: Arc<dyn ObjectStore>,
}

impl Transferor {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    async fn upload(&self, source: &Path, destination: &StorageLocator) -> JobOutcome {
        let open_error = |e| JobError::OpenSource {
            path: source.to_path_buf(),
            source: e,
        };

        let file = File::open(source).await.map_err(open_error)?;
        let size = file.metadata().await.map_err(open_error)?.len();

        self.store
            .put(destination.bucket(), destination.key(), file, size)
            .await
            .map_err(|e| JobError::Upload {
                path: source.to_path_buf(),
                locator: destination.clone(),
                source: e,
            })?;

        info!("Uploaded {} bytes to {}", size, destination);

        Ok(size)
    }

    #[instrument(skip(self))]
    async fn download(&self, source: &StorageLocator, destination: &Path) -> JobOutcome {
        let mut body = self
            .store
            .get(source.bucket(), source.key())
            .await
            .map_err(|e| JobError::Download {
                locator: source.clone(),
                source: e,
            })?;

        let create_error = |e| JobError::CreateDestination {
            path: destination.to_path_buf(),
            source: e,
        };

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(create_error)?;
        }

        let mut file = File::create(destination).await.map_err(create_error)?;

        match copy_body(&mut body, &mut file).await {
            Ok(bytes) => {
                info!("Downloaded {} bytes to {}", bytes, destination.display());
                Ok(bytes)
            }
            Err(e) => {
                drop(file);
                if let Err(cleanup) = fs::remove_file(destination).await {
                    warn!(
                        "Failed to remove partial download '{}': {}",
                        destination.display(),
                        cleanup
                    );
                }
                Err(JobError::Copy {
                    locator: source.clone(),
                    path: destination.to_path_buf(),
                    source: e,
                })
            }
        }
    }
}

async fn copy_body(body: &mut ObjectReader, file: &mut File) -> std::io::Result<u64> {
    let bytes = tokio::io::copy(body, file).await?;
    file.flush().await?;
    Ok(bytes)
}

#[async_trait]
impl TransferExecutor for Transferor {
    async fn transfer_one(&self, job: &TransferJob) -> JobOutcome {
        match job {
            TransferJob::Upload {
                source,
                destination,
            } => self.upload(source, destination).await,
            TransferJob::Download {
                source,
                destination,
            } => self.download(source, destination).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::TempDir;
    use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

    fn transferor(store: &Arc<MemoryStore>) -> Transferor {
        Transferor::new(store.clone())
    }

    #[tokio::test]
    async fn test_upload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello world").unwrap();

        let store = Arc::new(MemoryStore::new());
        let job = TransferJob::upload(&path, StorageLocator::new("b", "docs/a.txt"));

        let bytes = transferor(&store).transfer_one(&job).await.unwrap();

        assert_eq!(bytes, 11);
        assert_eq!(store.object("b", "docs/a.txt"), Some(b"hello world".to_vec()));
    }

    /// Store that records what each upload declared and received
    #[derive(Default)]
    struct RecordingStore {
        uploads: std::sync::Mutex<Vec<(String, u64, Vec<u8>)>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put(
            &self,
            _bucket: &str,
            key: &str,
            mut body: File,
            content_length: u64,
        ) -> anyhow::Result<()> {
            let mut data = Vec::new();
            body.read_to_end(&mut data).await?;
            self.uploads
                .lock()
                .unwrap()
                .push((key.to_string(), content_length, data));
            Ok(())
        }

        async fn get(&self, _bucket: &str, _key: &str) -> anyhow::Result<ObjectReader> {
            Ok(Box::pin(&b""[..]))
        }

        async fn list(&self, _bucket: &str, _prefix: &str) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_upload_declares_file_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("large.bin");
        let contents = vec![7u8; 256 * 1024];
        std::fs::write(&path, &contents).unwrap();

        let store = Arc::new(RecordingStore::default());
        let job = TransferJob::upload(&path, StorageLocator::new("b", "large.bin"));

        let bytes = Transferor::new(store.clone()).transfer_one(&job).await.unwrap();

        let uploads = store.uploads.lock().unwrap();
        assert_eq!(bytes, contents.len() as u64);
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "large.bin");
        assert_eq!(uploads[0].1, contents.len() as u64);
        assert_eq!(uploads[0].2, contents);
    }

    #[tokio::test]
    async fn test_upload_missing_source() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let job = TransferJob::upload(dir.path().join("gone.txt"), StorageLocator::new("b", "k"));

        let err = transferor(&store).transfer_one(&job).await.unwrap_err();

        assert!(matches!(err, JobError::OpenSource { .. }));
        assert!(err.to_string().contains("gone.txt"));
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_storage_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "x").unwrap();

        let store = Arc::new(MemoryStore::new());
        store.fail_put("k");
        let job = TransferJob::upload(&path, StorageLocator::new("b", "k"));

        let err = transferor(&store).transfer_one(&job).await.unwrap_err();

        assert!(matches!(err, JobError::Upload { .. }));
        assert!(err.to_string().contains("injected put failure"));
    }

    #[tokio::test]
    async fn test_download_creates_parents_and_truncates() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested/deeper/a.txt");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, "much longer previous contents").unwrap();

        let store = Arc::new(MemoryStore::new());
        store.insert("b", "logs/a.txt", "fresh");
        let job = TransferJob::download(StorageLocator::new("b", "logs/a.txt"), &target);

        let bytes = transferor(&store).transfer_one(&job).await.unwrap();

        assert_eq!(bytes, 5);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_download_missing_object_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.txt");
        let store = Arc::new(MemoryStore::new());
        let job = TransferJob::download(StorageLocator::new("b", "missing"), &target);

        let err = transferor(&store).transfer_one(&job).await.unwrap_err();

        assert!(matches!(err, JobError::Download { .. }));
        assert!(err.to_string().contains("NoSuchKey"));
        assert!(!target.exists());
    }

    /// Reader that fails on every poll
    struct BrokenReader;

    impl AsyncRead for BrokenReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "stream reset",
            )))
        }
    }

    /// Store whose object bodies break after a few bytes
    struct TruncatingStore;

    #[async_trait]
    impl ObjectStore for TruncatingStore {
        async fn put(
            &self,
            _bucket: &str,
            _key: &str,
            _body: File,
            _content_length: u64,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn get(&self, _bucket: &str, _key: &str) -> anyhow::Result<ObjectReader> {
            Ok(Box::pin((&b"partial"[..]).chain(BrokenReader)))
        }

        async fn list(&self, _bucket: &str, _prefix: &str) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_download_copy_failure_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.txt");
        let job = TransferJob::download(StorageLocator::new("b", "a.txt"), &target);

        let err = Transferor::new(Arc::new(TruncatingStore))
            .transfer_one(&job)
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Copy { .. }));
        assert!(err.to_string().contains("stream reset"));
        assert!(!target.exists());
    }
}
