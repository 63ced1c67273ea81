//! Storage URI parsing and local path classification

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::LocatorError;

/// Scheme prefix that marks an argument as a storage URI
pub const STORAGE_SCHEME: &str = "s3://";

/// Trailing marker that turns a download key into a prefix listing
pub const WILDCARD_MARKER: char = '*';

/// A resolved (bucket, key) pair
///
/// An empty key denotes the bucket itself: the bucket root as a prefix for
/// uploads, or "use the default file name" for single-file uploads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StorageLocator {
    bucket: String,
    key: String,
}

impl StorageLocator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Same bucket, different key
    pub fn with_key(&self, key: impl Into<String>) -> Self {
        Self::new(self.bucket.clone(), key)
    }

    /// Literal listing prefix when the key ends in the wildcard marker
    ///
    /// `s3://b/logs/*` yields `Some("logs/")`; `s3://b/*` yields `Some("")`.
    pub fn wildcard_prefix(&self) -> Option<&str> {
        self.key.strip_suffix(WILDCARD_MARKER)
    }

    /// Last non-empty `/`-separated segment of the key
    pub fn file_name(&self) -> Option<&str> {
        self.key.rsplit('/').next().filter(|segment| !segment.is_empty())
    }
}

impl fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}{}", STORAGE_SCHEME, self.bucket)
        } else {
            write!(f, "{}{}/{}", STORAGE_SCHEME, self.bucket, self.key)
        }
    }
}

/// Whether `path` carries the storage scheme prefix
pub fn is_storage_uri(path: &str) -> bool {
    path.starts_with(STORAGE_SCHEME)
}

/// Split a storage URI into bucket and key
///
/// Examples:
/// - `s3://mybucket/mykey` => ("mybucket", "mykey")
/// - `s3://mybucket/a/b/c` => ("mybucket", "a/b/c")
/// - `s3://mybucket/` => ("mybucket", "")
/// - `s3://mybucket` => ("mybucket", "")
pub fn resolve_storage_uri(path: &str) -> Result<StorageLocator, LocatorError> {
    let without_scheme = path
        .strip_prefix(STORAGE_SCHEME)
        .ok_or_else(|| LocatorError::NotStorageUri(path.to_string()))?;

    let (bucket, key) = match without_scheme.split_once('/') {
        Some((bucket, key)) => (bucket, key),
        None => (without_scheme, ""),
    };

    if bucket.is_empty() {
        return Err(LocatorError::EmptyBucket(path.to_string()));
    }

    Ok(StorageLocator::new(bucket, key))
}

/// A local path after canonicalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalPath {
    File(PathBuf),
    Directory(PathBuf),
}

impl LocalPath {
    pub fn path(&self) -> &Path {
        match self {
            LocalPath::File(path) | LocalPath::Directory(path) => path,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, LocalPath::Directory(_))
    }
}

/// Resolve `path` to its canonical absolute form and classify it
///
/// A missing path surfaces as the underlying `NotFound` error. Anything that
/// is neither a regular file nor a directory (sockets, devices) is rejected
/// with `InvalidInput`.
pub fn classify_local_path(path: impl AsRef<Path>) -> std::io::Result<LocalPath> {
    let canonical = std::fs::canonicalize(path.as_ref())?;
    let metadata = std::fs::metadata(&canonical)?;

    if metadata.is_dir() {
        Ok(LocalPath::Directory(canonical))
    } else if metadata.is_file() {
        Ok(LocalPath::File(canonical))
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!(
                "'{}' is neither a regular file nor a directory",
                canonical.display()
            ),
        ))
    }
}
