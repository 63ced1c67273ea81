//! Job planning
//!
//! Turns a [`TransferRequest`] into the full, ordered list of
//! [`TransferJob`]s. Planning is all-or-nothing: any enumeration, stat, or
//! listing failure yields a [`PlanError`] and no jobs.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::error::PlanError;
use crate::job::{TransferJob, TransferRequest};
use crate::locator::{classify_local_path, LocalPath, StorageLocator};
use crate::storage::ObjectStore;

/// Builds transfer jobs; needs the store only for wildcard listings
pub struct JobPlanner {
    store: Arc<dyn ObjectStore>,
}

impl JobPlanner {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Plan every job for `request`
    pub async fn plan(&self, request: &TransferRequest) -> Result<Vec<TransferJob>, PlanError> {
        let jobs = match request {
            TransferRequest::Upload {
                source,
                destination,
            } => {
                let source = source.clone();
                let destination = destination.clone();
                tokio::task::spawn_blocking(move || plan_upload(&source, &destination))
                    .await
                    .map_err(|e| PlanError::Interrupted(e.to_string()))??
            }
            TransferRequest::Download {
                source,
                destination,
            } => plan_download(self.store.as_ref(), source, destination).await?,
        };

        info!(
            direction = %request.direction(),
            jobs = jobs.len(),
            "Planned transfer"
        );

        Ok(jobs)
    }
}

/// Plan uploads from a local file or directory
///
/// A single file maps to the destination key, or to its own file name when
/// the key is empty. A directory maps every regular file beneath it to
/// `prefix/relative/path`, walked in file-name order.
pub fn plan_upload(
    source: &Path,
    destination: &StorageLocator,
) -> Result<Vec<TransferJob>, PlanError> {
    let local = classify_local_path(source).map_err(|e| PlanError::Stat {
        path: source.to_path_buf(),
        source: e,
    })?;

    match local {
        LocalPath::File(path) => {
            let key = if destination.key().is_empty() {
                file_name_of(&path)?
            } else {
                destination.key().to_string()
            };
            Ok(vec![TransferJob::upload(path, destination.with_key(key))])
        }
        LocalPath::Directory(root) => plan_directory_upload(&root, destination),
    }
}

fn plan_directory_upload(
    root: &Path,
    destination: &StorageLocator,
) -> Result<Vec<TransferJob>, PlanError> {
    let prefix = destination.key().trim_end_matches('/');
    let mut jobs = Vec::new();

    // Following links makes broken symlinks and cycles surface as errors
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| PlanError::Walk {
            root: root.to_path_buf(),
            source: e,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = relative_key(root, entry.path())?;
        let key = if prefix.is_empty() {
            relative
        } else {
            format!("{}/{}", prefix, relative)
        };

        debug!(path = %entry.path().display(), key = %key, "Planned upload");
        jobs.push(TransferJob::upload(
            entry.into_path(),
            destination.with_key(key),
        ));
    }

    Ok(jobs)
}

/// `/`-joined path of `path` relative to `root`, independent of platform separator
fn relative_key(root: &Path, path: &Path) -> Result<String, PlanError> {
    let relative = path.strip_prefix(root).map_err(|_| PlanError::Stat {
        path: path.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("not under source root '{}'", root.display()),
        ),
    })?;

    let segments: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();

    Ok(segments.join("/"))
}

fn file_name_of(path: &Path) -> Result<String, PlanError> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| PlanError::Stat {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path has no file name",
            ),
        })
}

/// Plan downloads from a single key or a wildcard prefix
#[instrument(skip(store))]
pub async fn plan_download(
    store: &dyn ObjectStore,
    source: &StorageLocator,
    destination: &Path,
) -> Result<Vec<TransferJob>, PlanError> {
    match source.wildcard_prefix() {
        Some(prefix) => plan_prefix_download(store, source, prefix, destination).await,
        None => plan_single_download(source, destination).map(|job| vec![job]),
    }
}

async fn plan_prefix_download(
    store: &dyn ObjectStore,
    source: &StorageLocator,
    prefix: &str,
    destination: &Path,
) -> Result<Vec<TransferJob>, PlanError> {
    if !is_existing_dir(destination)? {
        return Err(PlanError::DestinationNotDirectory(destination.to_path_buf()));
    }

    let listing = source.with_key(prefix);
    let keys = store
        .list(source.bucket(), prefix)
        .await
        .map_err(|e| PlanError::List {
            locator: listing,
            source: e,
        })?;

    let mut jobs = Vec::with_capacity(keys.len());
    for key in keys {
        // Folder placeholder objects carry no data
        if key.ends_with('/') {
            continue;
        }

        let suffix = key
            .strip_prefix(prefix)
            .unwrap_or(key.as_str())
            .trim_start_matches('/');
        if suffix.is_empty() {
            continue;
        }

        let local = join_key_suffix(destination, suffix).ok_or_else(|| PlanError::UnsafeKey {
            key: key.clone(),
            destination: destination.to_path_buf(),
        })?;

        debug!(key = %key, path = %local.display(), "Planned download");
        jobs.push(TransferJob::download(source.with_key(key), local));
    }

    Ok(jobs)
}

fn plan_single_download(
    source: &StorageLocator,
    destination: &Path,
) -> Result<TransferJob, PlanError> {
    let file_name = source
        .file_name()
        .ok_or_else(|| PlanError::MissingKey(source.clone()))?;

    let local = if is_existing_dir(destination)? {
        destination.join(file_name)
    } else {
        destination.to_path_buf()
    };

    Ok(TransferJob::download(source.clone(), local))
}

/// Join `/`-separated `suffix` under `root`, rejecting anything that could escape it
fn join_key_suffix(root: &Path, suffix: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in suffix.split('/') {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => return None,
        }
    }
    Some(path)
}

fn is_existing_dir(path: &Path) -> Result<bool, PlanError> {
    match std::fs::metadata(path) {
        Ok(metadata) => Ok(metadata.is_dir()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PlanError::Stat {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, contents: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn keys(jobs: &[TransferJob]) -> Vec<String> {
        jobs.iter().map(|job| job.locator().key().to_string()).collect()
    }

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.txt", "a");
        write(dir.path(), "sub/b.txt", "b");
        write(dir.path(), "sub/deeper/c.txt", "c");
        fs::create_dir(dir.path().join("empty")).unwrap();
        dir
    }

    #[test]
    fn test_single_file_uses_explicit_key() {
        let dir = tree();
        let jobs = plan_upload(
            &dir.path().join("a.txt"),
            &StorageLocator::new("b", "renamed.txt"),
        )
        .unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(keys(&jobs), vec!["renamed.txt"]);
        assert!(jobs[0].local_path().is_absolute());
    }

    #[test]
    fn test_single_file_defaults_to_base_name() {
        let dir = tree();
        let jobs = plan_upload(&dir.path().join("sub/b.txt"), &StorageLocator::new("b", "")).unwrap();
        assert_eq!(keys(&jobs), vec!["b.txt"]);
    }

    #[test]
    fn test_directory_without_prefix() {
        let dir = tree();
        let jobs = plan_upload(dir.path(), &StorageLocator::new("b", "")).unwrap();
        assert_eq!(keys(&jobs), vec!["a.txt", "sub/b.txt", "sub/deeper/c.txt"]);
    }

    #[test]
    fn test_directory_with_prefix() {
        let dir = tree();
        let jobs = plan_upload(dir.path(), &StorageLocator::new("mybucket", "images")).unwrap();

        assert_eq!(jobs.len(), 3);
        assert_eq!(
            keys(&jobs),
            vec!["images/a.txt", "images/sub/b.txt", "images/sub/deeper/c.txt"]
        );
        assert!(jobs.iter().all(|job| job.locator().bucket() == "mybucket"));
    }

    #[test]
    fn test_directory_prefix_trailing_slash_is_trimmed() {
        let dir = tree();
        let jobs = plan_upload(dir.path(), &StorageLocator::new("b", "images/")).unwrap();
        assert_eq!(keys(&jobs)[0], "images/a.txt");
    }

    #[test]
    fn test_empty_directory_plans_nothing() {
        let dir = TempDir::new().unwrap();
        let jobs = plan_upload(dir.path(), &StorageLocator::new("b", "x")).unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_missing_source_is_plan_error() {
        let dir = TempDir::new().unwrap();
        let err = plan_upload(&dir.path().join("nope"), &StorageLocator::new("b", "")).unwrap_err();
        assert!(matches!(err, PlanError::Stat { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_aborts_planning() {
        let dir = tree();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("sub/link")).unwrap();

        let err = plan_upload(dir.path(), &StorageLocator::new("b", "")).unwrap_err();
        assert!(matches!(err, PlanError::Walk { .. }));
    }

    #[test]
    fn test_join_key_suffix_rejects_escapes() {
        let root = Path::new("/out");
        assert_eq!(
            join_key_suffix(root, "a/b.txt"),
            Some(PathBuf::from("/out/a/b.txt"))
        );
        assert_eq!(join_key_suffix(root, "../etc/passwd"), None);
        assert_eq!(join_key_suffix(root, "a/./b"), None);
        assert_eq!(join_key_suffix(root, "a//b"), None);
    }

    #[tokio::test]
    async fn test_wildcard_download() {
        let store = MemoryStore::new();
        store.insert("bucket", "logs/a.txt", "a");
        store.insert("bucket", "logs/b.txt", "b");
        store.insert("bucket", "other/c.txt", "c");
        let out = TempDir::new().unwrap();

        let source = StorageLocator::new("bucket", "logs/*");
        let jobs = plan_download(&store, &source, out.path()).await.unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(
            jobs[0],
            TransferJob::download(StorageLocator::new("bucket", "logs/a.txt"), out.path().join("a.txt"))
        );
        assert_eq!(
            jobs[1],
            TransferJob::download(StorageLocator::new("bucket", "logs/b.txt"), out.path().join("b.txt"))
        );
    }

    #[tokio::test]
    async fn test_wildcard_without_separator_keeps_nested_suffix() {
        let store = MemoryStore::new();
        store.insert("bucket", "logs/2024/a.txt", "a");
        store.insert("bucket", "logs/", "");
        let out = TempDir::new().unwrap();

        let source = StorageLocator::new("bucket", "logs*");
        let jobs = plan_download(&store, &source, out.path()).await.unwrap();

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].local_path(), out.path().join("2024").join("a.txt"));
    }

    #[tokio::test]
    async fn test_wildcard_requires_directory_destination() {
        let store = MemoryStore::new();
        let out = TempDir::new().unwrap();
        let source = StorageLocator::new("bucket", "logs/*");

        let err = plan_download(&store, &source, &out.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::DestinationNotDirectory(_)));
    }

    #[tokio::test]
    async fn test_wildcard_list_failure_is_plan_error() {
        let store = MemoryStore::new();
        store.fail_list();
        let out = TempDir::new().unwrap();

        let err = plan_download(&store, &StorageLocator::new("bucket", "*"), out.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::List { .. }));
    }

    #[tokio::test]
    async fn test_wildcard_traversal_key_is_rejected() {
        let store = MemoryStore::new();
        store.insert("bucket", "logs/../../escape.txt", "x");
        let out = TempDir::new().unwrap();

        let err = plan_download(&store, &StorageLocator::new("bucket", "logs/*"), out.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::UnsafeKey { .. }));
    }

    #[tokio::test]
    async fn test_single_download_into_directory() {
        let store = MemoryStore::new();
        let out = TempDir::new().unwrap();
        let source = StorageLocator::new("bucket", "logs/a.txt");

        let jobs = plan_download(&store, &source, out.path()).await.unwrap();
        assert_eq!(jobs, vec![TransferJob::download(source, out.path().join("a.txt"))]);
    }

    #[tokio::test]
    async fn test_single_download_to_literal_path() {
        let store = MemoryStore::new();
        let out = TempDir::new().unwrap();
        let target = out.path().join("renamed.txt");
        let source = StorageLocator::new("bucket", "logs/a.txt");

        let jobs = plan_download(&store, &source, &target).await.unwrap();
        assert_eq!(jobs, vec![TransferJob::download(source, target)]);
    }

    #[tokio::test]
    async fn test_download_without_key_is_plan_error() {
        let store = MemoryStore::new();
        let out = TempDir::new().unwrap();

        for key in ["", "logs/"] {
            let err = plan_download(&store, &StorageLocator::new("bucket", key), out.path())
                .await
                .unwrap_err();
            assert!(matches!(err, PlanError::MissingKey(_)));
        }
    }

    #[tokio::test]
    async fn test_planner_dispatches_on_direction() {
        let dir = tree();
        let planner = JobPlanner::new(Arc::new(MemoryStore::new()));

        let request = TransferRequest::Upload {
            source: fs::canonicalize(dir.path()).unwrap(),
            destination: StorageLocator::new("mybucket", "images"),
        };
        let jobs = planner.plan(&request).await.unwrap();
        assert_eq!(jobs.len(), 3);
    }
}
