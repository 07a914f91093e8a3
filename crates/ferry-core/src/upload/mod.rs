//! Upload domain types, events, errors, and snapshots.
//!
//! This module contains pure data types for the upload queue. No task
//! spawning, networking, or runtime dependencies allowed.
//!
//! # Structure
//!
//! - `types` - Identifiers and file handles (`UploadId`, `UploadFile`, `FileHandle`)
//! - `item` - Per-file lifecycle record (`QueueItem`, `UploadStatus`)
//! - `progress` - Queue-wide aggregation (`QueueProgress`)
//! - `queue` - Snapshot DTO (`QueueSnapshot`)
//! - `events` - Event union (`UploadEvent`)
//! - `errors` - Error types for transports and transitions
//! - `subscription` - Receiving side of an event subscription

pub mod errors;
pub mod events;
pub mod item;
pub mod progress;
pub mod queue;
pub mod subscription;
pub mod types;

// Re-export commonly used types
pub use errors::{QueueError, UploadError};
pub use events::UploadEvent;
pub use item::{QueueItem, UploadOutput, UploadStatus};
pub use progress::QueueProgress;
pub use queue::QueueSnapshot;
pub use subscription::UploadSubscription;
pub use types::{FileHandle, FileInfo, LocalFile, UploadFile, UploadId};
