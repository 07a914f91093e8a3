//! Upload transport port.
//!
//! The queue is transport-agnostic: whoever builds it supplies an
//! `UploadTransport` that moves one file's bytes and reports progress.
//!
//! # Cancellation
//!
//! Cancellation is cooperative. The queue cannot stop a transport; it can
//! only signal it. A transport observes the signal in one of two ways:
//!
//! - `ProgressReporter::report` returns `Err(UploadError::Cancelled)`, which
//!   the transport propagates with `?`.
//! - `ProgressReporter::cancellation` exposes the token directly, for use in
//!   `tokio::select!` around long awaits.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::upload::{FileHandle, UploadError, UploadOutput};

/// Port for moving one file to its destination.
///
/// Implementations must:
/// - return `Err` on failure (the queue never inspects the error to decide
///   whether it was cancelled, it consults its own records);
/// - report percentages in `0.0..=100.0` that never decrease;
/// - stop promptly once the reporter signals cancellation.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Upload `file`, reporting progress through `progress`.
    async fn upload(
        &self,
        file: FileHandle,
        progress: ProgressReporter,
    ) -> Result<UploadOutput, UploadError>;
}

type ProgressSink = dyn Fn(f64, Instant) + Send + Sync;

/// Progress callback handed to a transport for one upload attempt.
///
/// Cloning is cheap; every clone reports into the same attempt.
#[derive(Clone)]
pub struct ProgressReporter {
    cancel: CancellationToken,
    sink: Arc<ProgressSink>,
}

impl ProgressReporter {
    /// Create a reporter that forwards `(percent, reported_at)` to `sink`.
    pub fn new(cancel: CancellationToken, sink: impl Fn(f64, Instant) + Send + Sync + 'static) -> Self {
        Self {
            cancel,
            sink: Arc::new(sink),
        }
    }

    /// A reporter that discards progress and is never cancelled from outside.
    ///
    /// For driving a transport directly, without a queue.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(CancellationToken::new(), |_, _| {})
    }

    /// Report progress as a percentage.
    ///
    /// Returns `Err(UploadError::Cancelled)` without recording anything once
    /// cancellation has been requested for this attempt.
    pub fn report(&self, percent: f64) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            tracing::trace!(percent, "Progress report after cancellation");
            return Err(UploadError::Cancelled);
        }
        (self.sink)(percent, Instant::now());
        Ok(())
    }

    /// Return `Err(UploadError::Cancelled)` if cancellation was requested.
    pub fn check(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that fires when this attempt is cancelled.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait until cancellation is requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
