//! Per-file upload lifecycle record.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use super::types::{FileHandle, UploadId};

/// Opaque value returned by a transport for a completed upload.
pub type UploadOutput = serde_json::Value;

/// Status of one upload.
///
/// ```text
/// pending --> uploading --> completed
///    |            |-------> error --(retry)--> pending
///    |            `-------> cancelled
///    `--------------------> cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Waiting for a free slot.
    Pending,
    /// Currently handed to the transport.
    Uploading,
    /// Transport resolved successfully.
    Completed,
    /// Transport rejected.
    Error,
    /// Cancelled by the caller.
    Cancelled,
}

impl UploadStatus {
    /// String representation (matches the serialized form).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "uploading" => Some(Self::Uploading),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// `completed`, `error` and `cancelled` are terminal for scheduling purposes.
    ///
    /// `error` can still be moved back to `pending` by an explicit retry.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }

    /// Whether the item currently occupies a slot.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Uploading)
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file's upload lifecycle record.
///
/// Instances handed out by the queue (snapshots, events) are copies; mutating
/// them has no effect on the queue.
#[derive(Clone, Debug)]
pub struct QueueItem {
    /// Stable id derived at submission.
    pub id: UploadId,
    /// Caller-owned file handle.
    pub file: FileHandle,
    /// Current status.
    pub status: UploadStatus,
    /// Progress percentage (0.0 - 100.0).
    pub progress: f64,
    /// Current transfer rate in megabits per second. Zero outside `uploading`.
    pub speed: f64,
    /// Estimated seconds remaining. Zero unless uploading with a known speed.
    pub eta: f64,
    /// Error message, set only while `status == error`.
    pub error: Option<String>,
    /// Transport result, set only once `status == completed`.
    pub result: Option<UploadOutput>,
    /// When the current (or last) attempt started.
    pub started_at: Option<DateTime<Utc>>,
    /// Bytes transferred in the current attempt, derived from progress.
    pub uploaded_bytes: u64,
    /// Number of times this item has been handed to the transport.
    pub attempts: u32,
}

impl QueueItem {
    /// Create a new pending item.
    pub fn new(id: UploadId, file: FileHandle) -> Self {
        Self {
            id,
            file,
            status: UploadStatus::Pending,
            progress: 0.0,
            speed: 0.0,
            eta: 0.0,
            error: None,
            result: None,
            started_at: None,
            uploaded_bytes: 0,
            attempts: 0,
        }
    }

    /// File name shortcut.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.file.name()
    }

    /// File size shortcut.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file.size()
    }

    /// Whether this item reached a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Serialize for QueueItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct FileRef<'a> {
            name: &'a str,
            size: u64,
        }

        let mut state = serializer.serialize_struct("QueueItem", 11)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field(
            "file",
            &FileRef {
                name: self.file.name(),
                size: self.file.size(),
            },
        )?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("progress", &self.progress)?;
        state.serialize_field("speed", &self.speed)?;
        state.serialize_field("eta", &self.eta)?;
        state.serialize_field("error", &self.error)?;
        state.serialize_field("result", &self.result)?;
        state.serialize_field("started_at", &self.started_at)?;
        state.serialize_field("uploaded_bytes", &self.uploaded_bytes)?;
        state.serialize_field("attempts", &self.attempts)?;
        state.end()
    }
}
