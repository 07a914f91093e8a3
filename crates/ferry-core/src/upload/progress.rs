//! Queue-wide progress aggregation.
//!
//! `QueueProgress` is always derived from the item collection; it is never
//! stored or updated incrementally.

use serde::{Deserialize, Serialize};

use super::item::{QueueItem, UploadStatus};

/// Aggregate view over every item in a queue.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueProgress {
    /// Number of items in the queue.
    pub total: usize,
    /// Items waiting for a slot.
    pub pending: usize,
    /// Items currently uploading.
    pub uploading: usize,
    /// Items that completed.
    pub completed: usize,
    /// Items that failed.
    pub failed: usize,
    /// Items that were cancelled.
    pub cancelled: usize,
    /// Unweighted mean of every item's progress (0.0 - 100.0).
    pub overall_progress: f64,
    /// Mean speed (Mbps) of uploading items that have reported a speed.
    pub overall_speed: f64,
    /// Largest ETA (seconds) among uploading items with a known speed.
    pub overall_eta: f64,
}

impl QueueProgress {
    /// Reduce a collection of items to queue-wide totals.
    pub fn from_items<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a QueueItem>,
    {
        let mut progress = Self::default();
        let mut progress_sum = 0.0;
        let mut speed_sum = 0.0;
        let mut speed_count = 0usize;

        for item in items {
            progress.total += 1;
            progress_sum += item.progress;

            match item.status {
                UploadStatus::Pending => progress.pending += 1,
                UploadStatus::Uploading => {
                    progress.uploading += 1;
                    // Items that have not reported yet would drag the mean to zero
                    if item.speed > 0.0 {
                        speed_sum += item.speed;
                        speed_count += 1;
                        if item.eta > progress.overall_eta {
                            progress.overall_eta = item.eta;
                        }
                    }
                }
                UploadStatus::Completed => progress.completed += 1,
                UploadStatus::Error => progress.failed += 1,
                UploadStatus::Cancelled => progress.cancelled += 1,
            }
        }

        progress.overall_progress = mean(progress_sum, progress.total);
        progress.overall_speed = mean(speed_sum, speed_count);
        progress
    }

    /// Number of items in a terminal status.
    #[must_use]
    pub const fn settled(&self) -> usize {
        self.completed + self.failed + self.cancelled
    }

    /// Every submitted item reached a terminal status (and there is at least one).
    #[must_use]
    pub const fn is_drained(&self) -> bool {
        self.total > 0 && self.settled() == self.total
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{FileInfo, UploadId};

    fn item(name: &str, status: UploadStatus, progress: f64, speed: f64, eta: f64) -> QueueItem {
        let mut item = QueueItem::new(UploadId::new(name), FileInfo::new(name, 100).into_handle());
        item.status = status;
        item.progress = progress;
        item.speed = speed;
        item.eta = eta;
        item
    }

    #[test]
    fn empty_collection_has_zero_progress() {
        let progress = QueueProgress::from_items(std::iter::empty());
        assert_eq!(progress.total, 0);
        assert!(progress.overall_progress.abs() < f64::EPSILON);
        assert!(!progress.is_drained());
    }

    #[test]
    fn counts_add_up_to_total() {
        let items = [
            item("a", UploadStatus::Pending, 0.0, 0.0, 0.0),
            item("b", UploadStatus::Uploading, 40.0, 2.0, 10.0),
            item("c", UploadStatus::Completed, 100.0, 0.0, 0.0),
            item("d", UploadStatus::Error, 20.0, 0.0, 0.0),
            item("e", UploadStatus::Cancelled, 5.0, 0.0, 0.0),
        ];
        let p = QueueProgress::from_items(&items);

        assert_eq!(p.total, 5);
        assert_eq!(p.pending + p.uploading + p.settled(), p.total);
        assert_eq!((p.pending, p.uploading), (1, 1));
        assert_eq!((p.completed, p.failed, p.cancelled), (1, 1, 1));
    }

    #[test]
    fn overall_progress_is_unweighted_mean() {
        let items = [
            item("a", UploadStatus::Completed, 100.0, 0.0, 0.0),
            item("b", UploadStatus::Uploading, 50.0, 1.0, 3.0),
        ];
        let p = QueueProgress::from_items(&items);
        assert!((p.overall_progress - 75.0).abs() < 1e-9);
    }

    #[test]
    fn speed_ignores_items_without_reports() {
        let items = [
            item("a", UploadStatus::Uploading, 10.0, 4.0, 20.0),
            item("b", UploadStatus::Uploading, 0.0, 0.0, 0.0),
            item("c", UploadStatus::Uploading, 30.0, 2.0, 45.0),
        ];
        let p = QueueProgress::from_items(&items);
        assert!((p.overall_speed - 3.0).abs() < 1e-9);
        assert!((p.overall_eta - 45.0).abs() < 1e-9);
    }

    #[test]
    fn drained_requires_all_terminal() {
        let mut items = vec![
            item("a", UploadStatus::Completed, 100.0, 0.0, 0.0),
            item("b", UploadStatus::Error, 0.0, 0.0, 0.0),
        ];
        assert!(QueueProgress::from_items(&items).is_drained());

        items.push(item("c", UploadStatus::Pending, 0.0, 0.0, 0.0));
        assert!(!QueueProgress::from_items(&items).is_drained());
    }
}
