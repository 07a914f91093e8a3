//! Upload events - discriminated union for all queue state changes.

use serde::Serialize;

use super::item::QueueItem;
use super::progress::QueueProgress;
use super::types::UploadId;

/// Single discriminated union for all upload queue events.
///
/// Per item the order is always `item_started`, zero or more
/// `item_progress`, then exactly one of `item_completed`, `item_error` or
/// `item_cancelled`. A retried item starts a new sequence.
///
/// ```typescript
/// type UploadEvent =
///   | { type: "item_started"; item: QueueItem }
///   | { type: "item_progress"; item: QueueItem }
///   | { type: "item_completed"; item: QueueItem }
///   | { type: "item_error"; item: QueueItem }
///   | { type: "item_cancelled"; item: QueueItem }
///   | { type: "queue_progress"; progress: QueueProgress }
///   | { type: "queue_completed"; items: QueueItem[] };
/// ```
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// An item was handed to the transport.
    ItemStarted {
        /// Copy of the item at the time of the event.
        item: QueueItem,
    },

    /// An uploading item reported progress.
    ItemProgress {
        /// Copy of the item at the time of the event.
        item: QueueItem,
    },

    /// An item completed.
    ItemCompleted {
        /// Copy of the item at the time of the event.
        item: QueueItem,
    },

    /// An item's transport rejected.
    ItemError {
        /// Copy of the item at the time of the event.
        item: QueueItem,
    },

    /// An item was cancelled.
    ItemCancelled {
        /// Copy of the item at the time of the event.
        item: QueueItem,
    },

    /// Aggregate progress after a mutation.
    QueueProgress {
        /// Recomputed totals.
        progress: QueueProgress,
    },

    /// Every item reached a terminal status.
    ///
    /// Emitted once per transition into the drained state.
    QueueCompleted {
        /// Items that completed successfully.
        items: Vec<QueueItem>,
    },
}

impl UploadEvent {
    /// Wire name of this event (`type` tag).
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ItemStarted { .. } => "item_started",
            Self::ItemProgress { .. } => "item_progress",
            Self::ItemCompleted { .. } => "item_completed",
            Self::ItemError { .. } => "item_error",
            Self::ItemCancelled { .. } => "item_cancelled",
            Self::QueueProgress { .. } => "queue_progress",
            Self::QueueCompleted { .. } => "queue_completed",
        }
    }

    /// The item this event is about, for item-level events.
    #[must_use]
    pub const fn item(&self) -> Option<&QueueItem> {
        match self {
            Self::ItemStarted { item }
            | Self::ItemProgress { item }
            | Self::ItemCompleted { item }
            | Self::ItemError { item }
            | Self::ItemCancelled { item } => Some(item),
            Self::QueueProgress { .. } | Self::QueueCompleted { .. } => None,
        }
    }

    /// Id of the item this event is about, for item-level events.
    #[must_use]
    pub fn item_id(&self) -> Option<&UploadId> {
        self.item().map(|item| &item.id)
    }

    /// Whether this event ends an item's sequence.
    #[must_use]
    pub const fn is_item_terminal(&self) -> bool {
        matches!(
            self,
            Self::ItemCompleted { .. } | Self::ItemError { .. } | Self::ItemCancelled { .. }
        )
    }
}
