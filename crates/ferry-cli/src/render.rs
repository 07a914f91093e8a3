//! Terminal rendering of upload events.
//!
//! One `indicatif` bar per started item, driven purely by the event
//! stream. The renderer never talks to the queue.

use std::collections::HashMap;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use ferry_core::{
    QueueItem, QueueProgress, UploadEvent, UploadId, format_eta, format_file_size, format_speed,
};

/// Final tallies for one `ferry upload` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Bytes of every completed file.
    pub bytes: u64,
}

impl Summary {
    fn new(progress: &QueueProgress, completed: &[QueueItem]) -> Self {
        Self {
            total: progress.total,
            completed: progress.completed,
            failed: progress.failed,
            cancelled: progress.cancelled,
            bytes: completed.iter().map(QueueItem::file_size).sum(),
        }
    }

    /// One-line human summary.
    pub fn line(&self) -> String {
        format!(
            "{} completed ({}), {} failed, {} cancelled",
            self.completed,
            format_file_size(self.bytes),
            self.failed,
            self.cancelled
        )
    }
}

/// Renders queue events as a stack of progress bars.
pub struct UploadRenderer {
    multi: MultiProgress,
    bars: HashMap<UploadId, ProgressBar>,
    latest: QueueProgress,
}

impl UploadRenderer {
    /// Draw on stderr (hidden automatically when it is not a terminal).
    pub fn stderr() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: HashMap::new(),
            latest: QueueProgress::default(),
        }
    }

    /// Most recent aggregate progress seen.
    pub const fn latest(&self) -> &QueueProgress {
        &self.latest
    }

    /// Number of bars created so far.
    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} {prefix:<24} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
    }

    fn bar_for(&mut self, item: &QueueItem) -> &ProgressBar {
        let multi = &self.multi;
        self.bars.entry(item.id.clone()).or_insert_with(|| {
            let pb = multi.add(ProgressBar::new(item.file_size()));
            pb.set_style(Self::bar_style());
            pb.set_prefix(item.file_name().to_string());
            pb
        })
    }

    /// Apply one event. Returns the run summary on `queue_completed`.
    pub fn handle(&mut self, event: &UploadEvent) -> Option<Summary> {
        match event {
            UploadEvent::ItemStarted { item } => {
                let pb = self.bar_for(item);
                pb.reset();
                pb.set_message(if item.attempts > 1 {
                    format!("retry #{}", item.attempts - 1)
                } else {
                    String::new()
                });
            }
            UploadEvent::ItemProgress { item } => {
                let pb = self.bar_for(item);
                pb.set_position(item.uploaded_bytes);
                if item.speed > 0.0 {
                    pb.set_message(format!(
                        "{} ETA {}",
                        format_speed(item.speed),
                        format_eta(item.eta)
                    ));
                }
            }
            UploadEvent::ItemCompleted { item } => {
                let pb = self.bar_for(item);
                pb.set_position(item.file_size());
                pb.finish_with_message("done");
            }
            UploadEvent::ItemError { item } => {
                let reason = item.error.as_deref().unwrap_or("failed").to_string();
                self.bar_for(item).abandon_with_message(reason);
            }
            UploadEvent::ItemCancelled { item } => match self.bars.get(&item.id) {
                Some(pb) => pb.abandon_with_message("cancelled"),
                None => {
                    let _ = self.multi.println(format!("{} cancelled", item.file_name()));
                }
            },
            UploadEvent::QueueProgress { progress } => {
                self.latest = progress.clone();
            }
            UploadEvent::QueueCompleted { items } => {
                return Some(Summary::new(&self.latest, items));
            }
        }
        None
    }

    /// Summary from whatever was seen so far (for a queue that stopped early).
    pub fn partial_summary(&self) -> Summary {
        Summary::new(&self.latest, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::{FileInfo, UploadStatus};

    fn item(name: &str, status: UploadStatus) -> QueueItem {
        let mut item = QueueItem::new(
            UploadId::derive(name, 2048, 1, None),
            FileInfo::new(name, 2048).into_handle(),
        );
        item.status = status;
        item
    }

    fn progress(completed: usize, failed: usize, cancelled: usize) -> UploadEvent {
        UploadEvent::QueueProgress {
            progress: QueueProgress {
                total: completed + failed + cancelled,
                completed,
                failed,
                cancelled,
                ..QueueProgress::default()
            },
        }
    }

    #[test]
    fn summary_on_queue_completed() {
        let mut renderer = UploadRenderer::with_draw_target(ProgressDrawTarget::hidden());
        let a = item("a.bin", UploadStatus::Uploading);
        let mut b = item("b.bin", UploadStatus::Error);
        b.error = Some("disk full".to_string());

        assert!(renderer.handle(&UploadEvent::ItemStarted { item: a.clone() }).is_none());
        assert!(renderer.handle(&UploadEvent::ItemStarted { item: b.clone() }).is_none());
        renderer.handle(&UploadEvent::ItemError { item: b });
        let mut done = a;
        done.status = UploadStatus::Completed;
        renderer.handle(&UploadEvent::ItemCompleted { item: done.clone() });
        renderer.handle(&progress(1, 1, 0));

        let summary = renderer
            .handle(&UploadEvent::QueueCompleted { items: vec![done] })
            .unwrap();

        assert_eq!(renderer.bar_count(), 2);
        assert_eq!(
            summary,
            Summary {
                total: 2,
                completed: 1,
                failed: 1,
                cancelled: 0,
                bytes: 2048,
            }
        );
        assert_eq!(summary.line(), "1 completed (2.00 KB), 1 failed, 0 cancelled");
    }

    #[test]
    fn cancelled_pending_item_gets_no_bar() {
        let mut renderer = UploadRenderer::with_draw_target(ProgressDrawTarget::hidden());
        renderer.handle(&UploadEvent::ItemCancelled {
            item: item("c.bin", UploadStatus::Cancelled),
        });
        renderer.handle(&progress(0, 0, 1));

        assert_eq!(renderer.bar_count(), 0);
        assert_eq!(renderer.partial_summary().cancelled, 1);
    }
}
