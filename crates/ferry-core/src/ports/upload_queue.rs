//! Upload queue port definition.
//!
//! This port defines the public interface for the upload subsystem. It hides
//! the runner task, cancellation tokens and leases behind a small async API.
//!
//! # Design
//!
//! - Only core upload domain types in signatures
//! - No method fails: misuse is a no-op and asynchronous failures surface
//!   through events and item status

use async_trait::async_trait;

use crate::upload::{FileHandle, QueueSnapshot, UploadId, UploadSubscription};

/// Port for managing uploads.
///
/// # Usage
///
/// ```ignore
/// let queue: Arc<dyn UploadQueuePort> = /* ... */;
///
/// let mut events = queue.subscribe();
/// let ids = queue.add_files(files, None).await;
///
/// // Cancel if needed
/// queue.cancel(&ids[0]).await;
///
/// let snapshot = queue.get_state().await;
/// ```
#[async_trait]
pub trait UploadQueuePort: Send + Sync {
    /// Submit files for upload.
    ///
    /// Returns the ids actually admitted. Files whose derived id is already in
    /// the queue are skipped, so the result may be shorter than `files`.
    async fn add_files(&self, files: Vec<FileHandle>, id_prefix: Option<&str>) -> Vec<UploadId>;

    /// Cancel a pending or uploading item.
    ///
    /// Returns `false` when the item is unknown or already terminal.
    async fn cancel(&self, id: &UploadId) -> bool;

    /// Re-queue a failed item.
    ///
    /// Returns `false` unless the item was in `error`.
    async fn retry(&self, id: &UploadId) -> bool;

    /// Remove completed and cancelled items. Returns how many were removed.
    async fn clear_completed(&self) -> usize;

    /// Remove every item, signalling cancellation to active uploads.
    /// Returns how many were removed.
    async fn clear(&self) -> usize;

    /// Point-in-time copy of every item and the aggregate progress.
    async fn get_state(&self) -> QueueSnapshot;

    /// Subscribe to queue events.
    fn subscribe(&self) -> UploadSubscription;
}
