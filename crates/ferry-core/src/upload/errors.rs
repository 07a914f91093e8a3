//! Upload error types.
//!
//! `UploadError` is what a transport returns. `QueueError` is a state
//! transition the queue refused; it never leaves the runner except as a log
//! line.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::item::UploadStatus;
use super::types::UploadId;

/// Why one upload attempt did not complete.
///
/// The queue stores `to_string()` of this as the item's error text, so
/// [`UploadError::other`] displays its message verbatim.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadError {
    /// Reading the source or writing the destination failed.
    #[error("I/O error ({error_kind}): {message}")]
    Io {
        /// `std::io::ErrorKind` name, e.g. `NotFound`.
        error_kind: String,
        message: String,
    },

    /// The destination refused the file.
    #[error("Rejected: {reason}")]
    Rejected { reason: String },

    /// The attempt observed its cancellation signal.
    #[error("Upload cancelled")]
    Cancelled,

    /// Anything else a transport reports.
    #[error("{message}")]
    Other { message: String },
}

impl UploadError {
    /// Capture a `std::io::Error` (which is neither `Clone` nor serializable).
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        Self::Io {
            error_kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}

/// A queue operation that does not apply to the item's current state.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// No item with this id is in the queue.
    #[error("Not in queue: {id}")]
    UnknownItem {
        /// The id that wasn't found.
        id: UploadId,
    },

    /// The item exists but its status does not allow the action.
    #[error("Cannot {action} {id} while {from}")]
    InvalidTransition {
        /// The item id.
        id: UploadId,
        /// Status the item was in.
        from: UploadStatus,
        /// Attempted action ("start", "retry", ...).
        action: &'static str,
    },
}

impl QueueError {
    /// Create an unknown item error.
    #[must_use]
    pub fn unknown(id: &UploadId) -> Self {
        Self::UnknownItem { id: id.clone() }
    }

    /// Create an invalid transition error.
    #[must_use]
    pub fn invalid(id: &UploadId, from: UploadStatus, action: &'static str) -> Self {
        Self::InvalidTransition {
            id: id.clone(),
            from,
            action,
        }
    }
}
