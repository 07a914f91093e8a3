//! The queue runner.
//!
//! One task owns the item state and the active-slot table. Facade calls,
//! progress reports and transport results all arrive as [`Command`]s on a
//! single channel and are applied one at a time, so there is exactly one
//! writer and no locks.
//!
//! # Leases
//!
//! Every dispatch mints a fresh [`LeaseId`]. Progress and settle messages
//! carry the lease they were issued under; once an item is cancelled or
//! cleared its lease is dropped and anything still in flight for it is
//! ignored.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use ferry_core::ports::{UploadEventEmitterPort, UploadTransport};
use ferry_core::upload::{
    FileHandle, QueueSnapshot, UploadError, UploadEvent, UploadId, UploadOutput,
};

use crate::bus::EventBus;
use crate::queue::{ProgressOutcome, UploadQueueState};

use super::worker::{self, UploadJob};

/// Lease ID for one dispatch of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct LeaseId(u64);

/// State for an item currently holding a slot.
struct ActiveJob {
    /// Lease of the current attempt.
    lease: LeaseId,
    /// Signals the transport to stop.
    cancel: CancellationToken,
}

/// Messages processed by the runner.
pub(crate) enum Command {
    AddFiles {
        files: Vec<FileHandle>,
        prefix: Option<String>,
        reply: oneshot::Sender<Vec<UploadId>>,
    },
    Cancel {
        id: UploadId,
        reply: oneshot::Sender<bool>,
    },
    Retry {
        id: UploadId,
        reply: oneshot::Sender<bool>,
    },
    ClearCompleted {
        reply: oneshot::Sender<usize>,
    },
    Clear {
        reply: oneshot::Sender<usize>,
    },
    Snapshot {
        reply: oneshot::Sender<QueueSnapshot>,
    },
    Progress {
        id: UploadId,
        lease: LeaseId,
        percent: f64,
        at: Instant,
    },
    Settle {
        id: UploadId,
        lease: LeaseId,
        result: Result<UploadOutput, UploadError>,
    },
    Shutdown {
        reply: oneshot::Sender<usize>,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AddFiles { .. } => "AddFiles",
            Self::Cancel { .. } => "Cancel",
            Self::Retry { .. } => "Retry",
            Self::ClearCompleted { .. } => "ClearCompleted",
            Self::Clear { .. } => "Clear",
            Self::Snapshot { .. } => "Snapshot",
            Self::Progress { .. } => "Progress",
            Self::Settle { .. } => "Settle",
            Self::Shutdown { .. } => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Owner of the queue state; see the module docs.
pub(crate) struct Runner {
    state: UploadQueueState,
    active: HashMap<UploadId, ActiveJob>,
    concurrency: usize,
    transport: Arc<dyn UploadTransport>,
    emitter: Arc<dyn UploadEventEmitterPort>,
    bus: EventBus,
    /// Weak so the channel closes once every facade handle and worker is gone.
    commands: mpsc::WeakUnboundedSender<Command>,
    lease_counter: u64,
    /// Previous drain state for transition detection.
    prev_is_drained: bool,
}

impl Runner {
    pub(crate) fn new(
        state: UploadQueueState,
        concurrency: usize,
        transport: Arc<dyn UploadTransport>,
        emitter: Arc<dyn UploadEventEmitterPort>,
        bus: EventBus,
        commands: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        Self {
            state,
            active: HashMap::new(),
            concurrency: concurrency.max(1),
            transport,
            emitter,
            bus,
            commands,
            lease_counter: 0,
            prev_is_drained: false,
        }
    }

    /// Process commands until shutdown or until every sender is gone.
    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        tracing::debug!(
            target: "ferry.upload",
            concurrency = self.concurrency,
            "Upload runner started"
        );

        while let Some(command) = rx.recv().await {
            if !self.handle(command) {
                break;
            }
        }

        // Tokens of uploads still running when the last handle went away
        for job in self.active.values() {
            job.cancel.cancel();
        }
        self.bus.close();
        tracing::debug!(target: "ferry.upload", "Upload runner stopped");
    }

    /// Apply one command. Returns `false` once the runner should stop.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::AddFiles {
                files,
                prefix,
                reply,
            } => {
                let ids = self.add_files(files, prefix.as_deref());
                let _ = reply.send(ids);
            }
            Command::Cancel { id, reply } => {
                let _ = reply.send(self.cancel(&id));
            }
            Command::Retry { id, reply } => {
                let _ = reply.send(self.retry(&id));
            }
            Command::ClearCompleted { reply } => {
                let _ = reply.send(self.clear_completed());
            }
            Command::Clear { reply } => {
                let _ = reply.send(self.clear());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            Command::Progress {
                id,
                lease,
                percent,
                at,
            } => self.on_progress(&id, lease, percent, at),
            Command::Settle { id, lease, result } => self.on_settle(&id, lease, result),
            Command::Shutdown { reply } => {
                let _ = reply.send(self.shutdown());
                return false;
            }
        }
        true
    }

    fn add_files(&mut self, files: Vec<FileHandle>, prefix: Option<&str>) -> Vec<UploadId> {
        let submitted = files.len();
        let timestamp_ms = Utc::now().timestamp_millis();
        let ids = self.state.admit(files, timestamp_ms, prefix);

        tracing::info!(
            target: "ferry.upload",
            submitted,
            admitted = ids.len(),
            "Files queued"
        );

        if !ids.is_empty() {
            self.schedule();
            self.publish_progress();
        }
        ids
    }

    fn cancel(&mut self, id: &UploadId) -> bool {
        let item = match self.state.cancel(id) {
            Ok(item) => item,
            Err(e) => {
                tracing::debug!(target: "ferry.upload", error = %e, "Cancel ignored");
                return false;
            }
        };

        if let Some(job) = self.active.remove(id) {
            job.cancel.cancel();
            tracing::info!(
                target: "ferry.upload",
                id = %id,
                lease = ?job.lease,
                "Cancelled active upload"
            );
        } else {
            tracing::info!(target: "ferry.upload", id = %id, "Cancelled pending upload");
        }

        self.emitter.emit(UploadEvent::ItemCancelled { item });
        self.schedule();
        self.publish_progress();
        true
    }

    fn retry(&mut self, id: &UploadId) -> bool {
        match self.state.retry(id) {
            Ok(item) => {
                tracing::info!(
                    target: "ferry.upload",
                    id = %id,
                    attempts = item.attempts,
                    "Retrying failed upload"
                );
                self.schedule();
                self.publish_progress();
                true
            }
            Err(e) => {
                tracing::debug!(target: "ferry.upload", error = %e, "Retry ignored");
                false
            }
        }
    }

    fn clear_completed(&mut self) -> usize {
        let removed = self.state.clear_completed();
        tracing::info!(target: "ferry.upload", removed, "Cleared finished uploads");
        self.publish_progress();
        removed
    }

    fn clear(&mut self) -> usize {
        let detached = self.active.len();
        for (_, job) in self.active.drain() {
            job.cancel.cancel();
        }
        let removed = self.state.clear();
        tracing::info!(target: "ferry.upload", removed, detached, "Cleared upload queue");
        self.publish_progress();
        removed
    }

    /// Cancel every unfinished item. Returns how many were cancelled.
    fn shutdown(&mut self) -> usize {
        let unfinished: Vec<UploadId> = self
            .state
            .items()
            .filter(|item| !item.is_terminal())
            .map(|item| item.id.clone())
            .collect();

        for job in self.active.values() {
            job.cancel.cancel();
        }
        self.active.clear();

        for id in &unfinished {
            if let Ok(item) = self.state.cancel(id) {
                self.emitter.emit(UploadEvent::ItemCancelled { item });
            }
        }
        if !unfinished.is_empty() {
            self.publish_progress();
        }

        tracing::info!(
            target: "ferry.upload",
            cancelled = unfinished.len(),
            "Upload queue shutting down"
        );
        unfinished.len()
    }

    fn on_progress(&mut self, id: &UploadId, lease: LeaseId, percent: f64, at: Instant) {
        if !self.lease_matches(id, lease) {
            tracing::trace!(
                target: "ferry.upload",
                id = %id,
                lease = ?lease,
                "Dropping stale progress"
            );
            return;
        }

        match self.state.record_progress(id, percent, at) {
            Ok(ProgressOutcome::Applied(item)) => {
                self.emitter.emit(UploadEvent::ItemProgress { item });
                self.publish_progress();
            }
            Ok(ProgressOutcome::Regressed { current, reported }) => {
                tracing::warn!(
                    target: "ferry.upload",
                    id = %id,
                    current,
                    reported,
                    "Transport reported decreasing progress"
                );
            }
            Ok(ProgressOutcome::Invalid) => {
                tracing::warn!(target: "ferry.upload", id = %id, "Transport reported NaN progress");
            }
            Err(e) => {
                tracing::debug!(target: "ferry.upload", error = %e, "Progress ignored");
            }
        }
    }

    fn on_settle(
        &mut self,
        id: &UploadId,
        lease: LeaseId,
        result: Result<UploadOutput, UploadError>,
    ) {
        if self.take_lease(id, lease).is_none() {
            tracing::debug!(
                target: "ferry.upload",
                id = %id,
                lease = ?lease,
                "Ignoring stale settle (lease mismatch)"
            );
            return;
        }

        // Every path that cancels a token drops its lease first, so a settle
        // that gets here was never cancelled by us, whatever error it carries
        let event = match result {
            Ok(output) => self.state.complete(id, output).map(|item| {
                tracing::info!(target: "ferry.upload", id = %id, "Upload completed");
                UploadEvent::ItemCompleted { item }
            }),
            Err(e) => self.state.fail(id, e.to_string()).map(|item| {
                tracing::warn!(target: "ferry.upload", id = %id, error = %e, "Upload failed");
                UploadEvent::ItemError { item }
            }),
        };

        match event {
            Ok(event) => self.emitter.emit(event),
            Err(e) => {
                tracing::error!(target: "ferry.upload", error = %e, "BUG: leased item not uploading");
            }
        }

        self.schedule();
        self.publish_progress();
    }

    /// Scheduler pass: fill free slots with pending items in insertion order.
    fn schedule(&mut self) {
        while self.active.len() < self.concurrency {
            let Some(id) = self.state.next_pending() else {
                break;
            };
            if !self.dispatch(id) {
                break;
            }
        }
    }

    fn dispatch(&mut self, id: UploadId) -> bool {
        let Some(commands) = self.commands.upgrade() else {
            tracing::warn!(
                target: "ferry.upload",
                id = %id,
                "Runner is closing, not starting upload"
            );
            return false;
        };

        let item = match self.state.start(&id, Instant::now(), Utc::now()) {
            Ok(item) => item,
            Err(e) => {
                tracing::error!(
                    target: "ferry.upload",
                    error = %e,
                    "BUG: pending item could not start"
                );
                return false;
            }
        };

        self.lease_counter += 1;
        let lease = LeaseId(self.lease_counter);
        let cancel = CancellationToken::new();
        self.active.insert(
            id.clone(),
            ActiveJob {
                lease,
                cancel: cancel.clone(),
            },
        );

        tracing::debug!(
            target: "ferry.upload",
            id = %id,
            lease = ?lease,
            attempt = item.attempts,
            active = self.active.len(),
            "Dispatching upload"
        );

        let file = FileHandle::clone(&item.file);
        self.emitter.emit(UploadEvent::ItemStarted { item });

        worker::spawn(
            UploadJob {
                id,
                lease,
                file,
                cancel,
            },
            Arc::clone(&self.transport),
            commands,
        );
        true
    }

    fn lease_matches(&self, id: &UploadId, lease: LeaseId) -> bool {
        self.active.get(id).is_some_and(|job| job.lease == lease)
    }

    /// Verify lease matches and remove from the active table.
    fn take_lease(&mut self, id: &UploadId, lease: LeaseId) -> Option<ActiveJob> {
        if self.lease_matches(id, lease) {
            self.active.remove(id)
        } else {
            None
        }
    }

    /// Emit aggregate progress and handle drain transitions.
    fn publish_progress(&mut self) {
        let progress = self.state.progress();
        let is_drained = progress.is_drained();

        tracing::trace!(
            target: "ferry.upload",
            total = progress.total,
            pending = progress.pending,
            uploading = progress.uploading,
            is_drained,
            "Queue progress"
        );
        self.emitter.emit(UploadEvent::QueueProgress { progress });

        let was_drained = self.prev_is_drained;
        self.prev_is_drained = is_drained;
        if is_drained && !was_drained {
            let items = self.state.completed_items();
            tracing::info!(
                target: "ferry.upload",
                completed = items.len(),
                "Upload queue drained"
            );
            self.emitter.emit(UploadEvent::QueueCompleted { items });
        }
    }
}
