//! Upload queue implementation.
//!
//! This module provides the concrete implementation of `UploadQueuePort`:
//! a cheap, cloneable facade in front of a long-lived runner task.
//!
//! # Architecture
//!
//! - **Facade** (`UploadQueue`): turns each call into a command and awaits
//!   the runner's reply
//! - **Runner**: sole owner of the item state and the active-slot table
//! - **Worker**: executes one dispatch, reports progress and the result
//!   back to the runner
//!
//! # Concurrency Model
//!
//! - Single runner per queue, started by `build_upload_queue`
//! - All mutations funnel through one unbounded command channel
//! - Lease tokens prevent stale progress and settle commits

mod runner;
mod worker;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use ferry_core::config::UploadQueueConfig;
use ferry_core::ports::{FanoutEmitter, UploadEventEmitterPort, UploadQueuePort, UploadTransport};
use ferry_core::upload::{FileHandle, QueueSnapshot, UploadId, UploadSubscription};

use crate::bus::EventBus;
use crate::queue::UploadQueueState;

use runner::{Command, Runner};

/// Dependencies for creating an upload queue.
pub struct UploadQueueDeps {
    /// Moves the bytes of one file.
    pub transport: Arc<dyn UploadTransport>,
    /// Concurrency and speed smoothing.
    pub config: UploadQueueConfig,
    /// Optional extra sink that sees every event after the subscribers do.
    pub event_emitter: Option<Arc<dyn UploadEventEmitterPort>>,
}

impl UploadQueueDeps {
    /// Dependencies with the default configuration and no extra emitter.
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            transport,
            config: UploadQueueConfig::default(),
            event_emitter: None,
        }
    }

    /// Use `config` instead of the default.
    #[must_use]
    pub fn with_config(mut self, config: UploadQueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Forward every event to `emitter` as well.
    #[must_use]
    pub fn with_event_emitter(mut self, emitter: Arc<dyn UploadEventEmitterPort>) -> Self {
        self.event_emitter = Some(emitter);
        self
    }
}

/// Build an upload queue and start its runner.
///
/// Must be called from within a Tokio runtime. The returned handle can be
/// stored as `Arc<dyn UploadQueuePort>` in adapters.
pub fn build_upload_queue(deps: UploadQueueDeps) -> UploadQueue {
    let UploadQueueDeps {
        transport,
        config,
        event_emitter,
    } = deps;

    let bus = EventBus::new();
    let mut fanout = FanoutEmitter::new().with(Arc::new(bus.clone()));
    if let Some(extra) = event_emitter {
        fanout = fanout.with(extra);
    }

    let concurrency = config.effective_concurrency();
    let (tx, rx) = mpsc::unbounded_channel();
    let runner = Runner::new(
        UploadQueueState::new(config.effective_speed_smoothing()),
        concurrency,
        transport,
        Arc::new(fanout),
        bus.clone(),
        tx.downgrade(),
    );
    tokio::spawn(runner.run(rx));

    tracing::info!(target: "ferry.upload", concurrency, "Upload queue started");

    UploadQueue {
        commands: tx,
        bus,
        concurrency,
    }
}

/// Handle to a running upload queue.
///
/// Cloning is cheap; every clone talks to the same runner. The runner stops
/// after [`shutdown`](Self::shutdown) or once every handle is dropped and the
/// in-flight uploads have settled.
#[derive(Clone, Debug)]
pub struct UploadQueue {
    commands: mpsc::UnboundedSender<Command>,
    bus: EventBus,
    concurrency: usize,
}

impl UploadQueue {
    /// Maximum number of simultaneous uploads.
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Whether the runner is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Cancel every unfinished item and stop the runner.
    ///
    /// Returns how many items were cancelled. Subscriptions end once their
    /// buffered events have been received.
    pub async fn shutdown(&self) -> usize {
        self.request("shutdown", |reply| Command::Shutdown { reply })
            .await
            .unwrap_or_default()
    }

    async fn request<T>(
        &self,
        op: &'static str,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(make(reply)).is_err() {
            tracing::warn!(target: "ferry.upload", op, "Upload queue is not running");
            return None;
        }
        match rx.await {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(target: "ferry.upload", op, "Upload queue stopped before replying");
                None
            }
        }
    }
}

// =============================================================================
// UploadQueuePort implementation
// =============================================================================

#[async_trait]
impl UploadQueuePort for UploadQueue {
    async fn add_files(&self, files: Vec<FileHandle>, id_prefix: Option<&str>) -> Vec<UploadId> {
        if files.is_empty() {
            return Vec::new();
        }
        let prefix = id_prefix.map(str::to_string);
        self.request("add_files", |reply| Command::AddFiles {
            files,
            prefix,
            reply,
        })
        .await
        .unwrap_or_default()
    }

    async fn cancel(&self, id: &UploadId) -> bool {
        let id = id.clone();
        self.request("cancel", |reply| Command::Cancel { id, reply })
            .await
            .unwrap_or(false)
    }

    async fn retry(&self, id: &UploadId) -> bool {
        let id = id.clone();
        self.request("retry", |reply| Command::Retry { id, reply })
            .await
            .unwrap_or(false)
    }

    async fn clear_completed(&self) -> usize {
        self.request("clear_completed", |reply| Command::ClearCompleted { reply })
            .await
            .unwrap_or_default()
    }

    async fn clear(&self) -> usize {
        self.request("clear", |reply| Command::Clear { reply })
            .await
            .unwrap_or_default()
    }

    async fn get_state(&self) -> QueueSnapshot {
        self.request("get_state", |reply| Command::Snapshot { reply })
            .await
            .unwrap_or_default()
    }

    fn subscribe(&self) -> UploadSubscription {
        self.bus.subscribe()
    }
}
