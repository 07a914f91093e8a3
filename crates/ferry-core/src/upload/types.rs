//! Core identifiers and file handles for uploads.
//!
//! Pure data types with no I/O dependencies beyond reading file metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Stable identifier for one queued upload.
///
/// Derived from the file name, file size, the submission timestamp and an
/// optional caller prefix. Two submissions that derive the same id are the
/// same upload as far as the queue is concerned.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(String);

impl UploadId {
    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the id for a file submitted at `timestamp_ms`.
    ///
    /// Format: `{name}-{size}-{timestamp}` or `{prefix}-{name}-{size}-{timestamp}`.
    pub fn derive(name: &str, size: u64, timestamp_ms: i64, prefix: Option<&str>) -> Self {
        match prefix {
            Some(prefix) => Self(format!("{prefix}-{name}-{size}-{timestamp_ms}")),
            None => Self(format!("{name}-{size}-{timestamp_ms}")),
        }
    }

    /// Derive the id for a file handle.
    pub fn for_file(file: &dyn UploadFile, timestamp_ms: i64, prefix: Option<&str>) -> Self {
        Self::derive(file.name(), file.size(), timestamp_ms, prefix)
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UploadId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for UploadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A file the caller wants uploaded.
///
/// The queue only ever reads the name and size; the handle itself is owned by
/// the caller and handed untouched to the transport.
pub trait UploadFile: fmt::Debug + Send + Sync {
    /// File name used for id derivation and display.
    fn name(&self) -> &str;

    /// Size in bytes, used for id derivation and speed/ETA estimation.
    fn size(&self) -> u64;

    /// Location on disk, when the file has one.
    fn local_path(&self) -> Option<&Path> {
        None
    }
}

/// Shared handle to a caller-owned file.
pub type FileHandle = Arc<dyn UploadFile>;

/// A plain name + size descriptor.
///
/// Useful for transports that resolve the bytes themselves, and in tests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

impl FileInfo {
    /// Create a new descriptor.
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }

    /// Wrap this descriptor in a [`FileHandle`].
    #[must_use]
    pub fn into_handle(self) -> FileHandle {
        Arc::new(self)
    }
}

impl UploadFile for FileInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// A regular file on the local filesystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    size: u64,
}

impl LocalFile {
    /// Stat `path` and build a handle for it.
    pub fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        Ok(Self {
            name,
            size: metadata.len(),
            path,
        })
    }

    /// Path of the file on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UploadFile for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn local_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}
