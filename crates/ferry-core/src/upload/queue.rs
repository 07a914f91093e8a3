//! Queue snapshot DTO.

use serde::Serialize;

use super::item::{QueueItem, UploadStatus};
use super::progress::QueueProgress;
use super::types::UploadId;

/// Point-in-time copy of a queue: every item in insertion order plus totals.
#[derive(Clone, Debug, Default, Serialize)]
pub struct QueueSnapshot {
    /// Items in insertion order.
    pub items: Vec<QueueItem>,
    /// Aggregate progress over `items`.
    pub progress: QueueProgress,
}

impl QueueSnapshot {
    /// Build a snapshot, deriving the aggregate from `items`.
    #[must_use]
    pub fn new(items: Vec<QueueItem>) -> Self {
        let progress = QueueProgress::from_items(&items);
        Self { items, progress }
    }

    /// Check if the queue is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the total number of items.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    /// Get an item by its id.
    pub fn get(&self, id: &UploadId) -> Option<&QueueItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Status of an item, if present.
    pub fn status_of(&self, id: &UploadId) -> Option<UploadStatus> {
        self.get(id).map(|item| item.status)
    }

    /// Iterate over items with the given status.
    pub fn with_status(&self, status: UploadStatus) -> impl Iterator<Item = &QueueItem> {
        self.items.iter().filter(move |item| item.status == status)
    }
}
