//! Upload queue state.
//!
//! This module provides a pure state machine for the items of one queue.
//! Scheduling, tasks and events belong to the runner; this type only
//! validates and applies transitions.
//!
//! # Design
//!
//! - Pure synchronous state machine (no async, no IO, no tracing)
//! - Items are kept in insertion order, which is also the dispatch order
//! - Every transition returns a copy of the item for the caller to publish
//!
//! ```text
//! pending --start--> uploading --complete--> completed
//!    |                   |------fail------> error --retry--> pending
//!    |                   `-----cancel-----> cancelled
//!    `---------cancel----------------------> cancelled
//! ```

mod speed;

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use ferry_core::upload::{
    FileHandle, QueueError, QueueItem, QueueProgress, QueueSnapshot, UploadId, UploadOutput,
    UploadStatus,
};

pub use speed::{SpeedEstimator, bytes_per_sec_to_mbps, eta_seconds};

/// What happened to a progress report.
#[derive(Debug, Clone)]
pub enum ProgressOutcome {
    /// The report was recorded; carries the updated item.
    Applied(QueueItem),
    /// The report was below the item's current progress and was dropped.
    Regressed {
        /// Progress already recorded.
        current: f64,
        /// Progress that was reported (after clamping).
        reported: f64,
    },
    /// The report was not a number.
    Invalid,
}

/// Items of one queue plus the speed meters of their current attempts.
///
/// This is a sync type with no internal locking; the runner task owns it.
#[derive(Debug)]
pub struct UploadQueueState {
    items: IndexMap<UploadId, QueueItem>,
    meters: HashMap<UploadId, SpeedEstimator>,
    speed_smoothing: f64,
}

impl Default for UploadQueueState {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl UploadQueueState {
    /// Create an empty state whose speed meters use `speed_smoothing`.
    pub fn new(speed_smoothing: f64) -> Self {
        Self {
            items: IndexMap::new(),
            meters: HashMap::new(),
            speed_smoothing,
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up an item.
    pub fn get(&self, id: &UploadId) -> Option<&QueueItem> {
        self.items.get(id)
    }

    /// Iterate over items in insertion order.
    pub fn items(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.values()
    }

    /// Number of items currently uploading.
    pub fn uploading_count(&self) -> usize {
        self.items
            .values()
            .filter(|item| item.status == UploadStatus::Uploading)
            .count()
    }

    /// Register new files.
    ///
    /// Ids are derived from each file and the batch timestamp; a file whose id
    /// is already present (from this batch or an earlier one) is skipped.
    /// Returns the ids that were added.
    pub fn admit(
        &mut self,
        files: Vec<FileHandle>,
        timestamp_ms: i64,
        prefix: Option<&str>,
    ) -> Vec<UploadId> {
        let mut admitted = Vec::with_capacity(files.len());
        for file in files {
            let id = UploadId::for_file(file.as_ref(), timestamp_ms, prefix);
            if self.items.contains_key(&id) {
                continue;
            }
            self.items
                .insert(id.clone(), QueueItem::new(id.clone(), file));
            admitted.push(id);
        }
        admitted
    }

    /// The oldest pending item, if any.
    pub fn next_pending(&self) -> Option<UploadId> {
        self.items
            .values()
            .find(|item| item.status == UploadStatus::Pending)
            .map(|item| item.id.clone())
    }

    /// Move a pending item to `uploading` and start a fresh attempt.
    pub fn start(
        &mut self,
        id: &UploadId,
        now: Instant,
        started_at: DateTime<Utc>,
    ) -> Result<QueueItem, QueueError> {
        let item = expect_status(&mut self.items, id, UploadStatus::Pending, "start")?;
        item.status = UploadStatus::Uploading;
        item.progress = 0.0;
        item.speed = 0.0;
        item.eta = 0.0;
        item.uploaded_bytes = 0;
        item.error = None;
        item.result = None;
        item.started_at = Some(started_at);
        item.attempts = item.attempts.saturating_add(1);
        let snapshot = item.clone();

        self.meters
            .insert(id.clone(), SpeedEstimator::new(self.speed_smoothing, now));
        Ok(snapshot)
    }

    /// Record a progress percentage reported at `at` for an uploading item.
    ///
    /// The value is clamped to `0.0..=100.0`. Reports below the current
    /// progress are not applied.
    pub fn record_progress(
        &mut self,
        id: &UploadId,
        percent: f64,
        at: Instant,
    ) -> Result<ProgressOutcome, QueueError> {
        let alpha = self.speed_smoothing;
        let item = expect_status(
            &mut self.items,
            id,
            UploadStatus::Uploading,
            "report progress for",
        )?;

        if percent.is_nan() {
            return Ok(ProgressOutcome::Invalid);
        }
        let percent = percent.clamp(0.0, 100.0);
        if percent < item.progress {
            return Ok(ProgressOutcome::Regressed {
                current: item.progress,
                reported: percent,
            });
        }

        let size = item.file_size();
        let bytes = bytes_at(size, percent);
        let meter = self
            .meters
            .entry(id.clone())
            .or_insert_with(|| SpeedEstimator::new(alpha, at));
        let speed = meter.sample(bytes, at);

        item.progress = percent;
        item.uploaded_bytes = bytes;
        item.speed = speed;
        item.eta = if percent < 100.0 {
            eta_seconds(size, bytes, speed)
        } else {
            0.0
        };

        Ok(ProgressOutcome::Applied(item.clone()))
    }

    /// Mark an uploading item as completed with the transport's result.
    pub fn complete(
        &mut self,
        id: &UploadId,
        output: UploadOutput,
    ) -> Result<QueueItem, QueueError> {
        let item = expect_status(&mut self.items, id, UploadStatus::Uploading, "complete")?;
        item.status = UploadStatus::Completed;
        item.progress = 100.0;
        item.uploaded_bytes = item.file.size();
        item.speed = 0.0;
        item.eta = 0.0;
        item.result = Some(output);
        let snapshot = item.clone();

        self.meters.remove(id);
        Ok(snapshot)
    }

    /// Mark an uploading item as failed.
    pub fn fail(
        &mut self,
        id: &UploadId,
        message: impl Into<String>,
    ) -> Result<QueueItem, QueueError> {
        let item = expect_status(&mut self.items, id, UploadStatus::Uploading, "fail")?;
        item.status = UploadStatus::Error;
        item.speed = 0.0;
        item.eta = 0.0;
        item.error = Some(message.into());
        let snapshot = item.clone();

        self.meters.remove(id);
        Ok(snapshot)
    }

    /// Cancel a pending or uploading item.
    pub fn cancel(&mut self, id: &UploadId) -> Result<QueueItem, QueueError> {
        let item = self.items.get_mut(id).ok_or_else(|| QueueError::unknown(id))?;
        if item.status.is_terminal() {
            return Err(QueueError::invalid(id, item.status, "cancel"));
        }
        item.status = UploadStatus::Cancelled;
        item.speed = 0.0;
        item.eta = 0.0;
        let snapshot = item.clone();

        self.meters.remove(id);
        Ok(snapshot)
    }

    /// Put a failed item back into `pending` with its attempt state reset.
    pub fn retry(&mut self, id: &UploadId) -> Result<QueueItem, QueueError> {
        let item = expect_status(&mut self.items, id, UploadStatus::Error, "retry")?;
        item.status = UploadStatus::Pending;
        item.progress = 0.0;
        item.speed = 0.0;
        item.eta = 0.0;
        item.uploaded_bytes = 0;
        item.error = None;
        item.started_at = None;
        Ok(item.clone())
    }

    /// Remove completed and cancelled items. Returns how many were removed.
    pub fn clear_completed(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|_, item| {
            !matches!(
                item.status,
                UploadStatus::Completed | UploadStatus::Cancelled
            )
        });
        let items = &self.items;
        self.meters.retain(|id, _| items.contains_key(id));
        before - self.items.len()
    }

    /// Remove every item. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        self.meters.clear();
        removed
    }

    /// Queue-wide totals over the current items.
    pub fn progress(&self) -> QueueProgress {
        QueueProgress::from_items(self.items.values())
    }

    /// Copies of the completed items, in insertion order.
    pub fn completed_items(&self) -> Vec<QueueItem> {
        self.items
            .values()
            .filter(|item| item.status == UploadStatus::Completed)
            .cloned()
            .collect()
    }

    /// Point-in-time copy of every item and the aggregate.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot::new(self.items.values().cloned().collect())
    }
}

/// Look up an item and check it is in `expected` status.
fn expect_status<'a>(
    items: &'a mut IndexMap<UploadId, QueueItem>,
    id: &UploadId,
    expected: UploadStatus,
    action: &'static str,
) -> Result<&'a mut QueueItem, QueueError> {
    let item = items.get_mut(id).ok_or_else(|| QueueError::unknown(id))?;
    if item.status == expected {
        Ok(item)
    } else {
        Err(QueueError::invalid(id, item.status, action))
    }
}

/// Bytes corresponding to `percent` of `size`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn bytes_at(size: u64, percent: f64) -> u64 {
    let bytes = (size as f64 * percent / 100.0).round() as u64;
    bytes.min(size)
}
