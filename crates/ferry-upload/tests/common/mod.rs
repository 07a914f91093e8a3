//! Shared helpers for upload queue integration tests.
//!
//! `GatedTransport` holds every upload open until the test releases it, so
//! scheduling can be observed step by step without timing assumptions.

// Not every test binary uses every helper
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use ferry_upload::{
    FileHandle, ProgressReporter, QueueSnapshot, UploadError, UploadEvent, UploadId, UploadOutput,
    UploadQueue, UploadQueuePort, UploadStatus, UploadSubscription, UploadTransport,
};
use ferry_core::upload::FileInfo;

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

struct Gate {
    reporter: ProgressReporter,
    finish: oneshot::Sender<Result<UploadOutput, UploadError>>,
}

#[derive(Default)]
struct GateState {
    open: HashMap<String, Gate>,
    calls: Vec<String>,
}

/// Transport whose uploads finish only when the test says so.
#[derive(Clone, Default)]
pub struct GatedTransport {
    state: Arc<Mutex<GateState>>,
    ignore_cancel: bool,
}

impl GatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that keeps running after cancellation until released.
    pub fn ignoring_cancellation() -> Self {
        Self {
            ignore_cancel: true,
            ..Self::default()
        }
    }

    /// Names of files with an upload in flight, sorted.
    pub fn open(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state.lock().unwrap().open.keys().cloned().collect();
        names.sort();
        names
    }

    /// How many times `name` was handed to the transport.
    pub fn calls(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|n| *n == name)
            .count()
    }

    /// Wait until `name` has an upload in flight.
    pub async fn wait_open(&self, name: &str) {
        let found = tokio::time::timeout(WAIT, async {
            while !self.state.lock().unwrap().open.contains_key(name) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await;
        assert!(found.is_ok(), "upload of {name} never started");
    }

    /// Wait until exactly `names` (sorted) have uploads in flight.
    pub async fn wait_open_exactly(&self, names: &[&str]) {
        let found = tokio::time::timeout(WAIT, async {
            while self.open() != names {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await;
        assert!(found.is_ok(), "in flight: {:?}, expected {names:?}", self.open());
    }

    /// Report progress for the in-flight upload of `name`.
    pub fn report(&self, name: &str, percent: f64) -> Result<(), UploadError> {
        let state = self.state.lock().unwrap();
        let gate = state.open.get(name).expect("upload not in flight");
        gate.reporter.report(percent)
    }

    /// Settle the in-flight upload of `name`.
    pub fn finish(&self, name: &str, result: Result<UploadOutput, UploadError>) {
        let gate = self
            .state
            .lock()
            .unwrap()
            .open
            .remove(name)
            .expect("upload not in flight");
        let _ = gate.finish.send(result);
    }

    pub fn succeed(&self, name: &str) {
        self.finish(name, Ok(serde_json::json!({ "name": name })));
    }

    pub fn fail(&self, name: &str, message: &str) {
        self.finish(name, Err(UploadError::other(message)));
    }
}

#[async_trait]
impl UploadTransport for GatedTransport {
    async fn upload(
        &self,
        file: FileHandle,
        progress: ProgressReporter,
    ) -> Result<UploadOutput, UploadError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock().unwrap();
            state.calls.push(file.name().to_string());
            state.open.insert(
                file.name().to_string(),
                Gate {
                    reporter: progress.clone(),
                    finish: tx,
                },
            );
        }

        let released = async {
            rx.await
                .unwrap_or_else(|_| Err(UploadError::other("gate dropped")))
        };

        if self.ignore_cancel {
            return released.await;
        }

        let result = tokio::select! {
            result = released => result,
            () = progress.cancelled() => Err(UploadError::Cancelled),
        };
        self.state.lock().unwrap().open.remove(file.name());
        result
    }
}

/// File handles named `names`, 1 MiB each.
pub fn files(names: &[&str]) -> Vec<FileHandle> {
    names
        .iter()
        .map(|name| FileInfo::new(*name, 1024 * 1024).into_handle())
        .collect()
}

/// Poll the queue until `id` reaches `status`.
pub async fn wait_for_status(queue: &UploadQueue, id: &UploadId, status: UploadStatus) {
    let reached = tokio::time::timeout(WAIT, async {
        loop {
            if queue.get_state().await.status_of(id) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "{id} never reached {status}");
}

/// Poll the queue until every item is terminal and return the final state.
pub async fn wait_drained(queue: &UploadQueue) -> QueueSnapshot {
    tokio::time::timeout(WAIT, async {
        loop {
            let snapshot = queue.get_state().await;
            if snapshot.progress.is_drained() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("queue never drained")
}

/// Receive events until one matches `pred`, returning everything received.
pub async fn collect_until(
    events: &mut UploadSubscription,
    pred: impl Fn(&UploadEvent) -> bool,
) -> Vec<UploadEvent> {
    let mut seen = Vec::new();
    let done = tokio::time::timeout(WAIT, async {
        while let Some(event) = events.recv().await {
            let stop = pred(&event);
            seen.push(event);
            if stop {
                return true;
            }
        }
        false
    })
    .await;
    assert!(matches!(done, Ok(true)), "expected event never arrived");
    seen
}

/// Id of the item an item-level event is about, as a file name.
pub fn item_name(event: &UploadEvent) -> Option<&str> {
    event.item().map(|item| item.file_name())
}
