//! Three-phase transport adapter.
//!
//! Most real uploads are a short setup step (reserve a slot, get a target),
//! the byte transfer, and a short commit step. [`PhasedTransport`] runs an
//! implementation of [`PhasedUpload`] and maps the three phases onto one
//! percentage: by default `0-10` for prepare, `10-90` for the transfer
//! (proportional to bytes sent) and `90-100` for finalize.
//!
//! Cancellation is checked before each phase and on every byte report.
//! When a phase fails or is cancelled after `prepare` succeeded, the ticket is
//! handed to [`PhasedUpload::abort`] for cleanup.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use ferry_core::ports::{ProgressReporter, UploadTransport};
use ferry_core::upload::{FileHandle, UploadError, UploadOutput};

/// Widths of the prepare, transfer and finalize phases in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSplit {
    prepare: f64,
    transfer: f64,
    finalize: f64,
}

impl Default for PhaseSplit {
    fn default() -> Self {
        Self {
            prepare: 10.0,
            transfer: 80.0,
            finalize: 10.0,
        }
    }
}

impl PhaseSplit {
    /// Custom split. Each width must be finite and non-negative and the three
    /// must add up to 100.
    pub fn new(prepare: f64, transfer: f64, finalize: f64) -> Option<Self> {
        let widths = [prepare, transfer, finalize];
        let valid = widths.iter().all(|w| w.is_finite() && *w >= 0.0)
            && (widths.iter().sum::<f64>() - 100.0).abs() < 1e-6;
        valid.then_some(Self {
            prepare,
            transfer,
            finalize,
        })
    }

    /// Percentage reached once prepare is done.
    pub fn prepared(&self) -> f64 {
        self.prepare
    }

    /// Percentage for `sent` of `total` bytes during the transfer phase.
    ///
    /// An empty file counts as fully transferred.
    #[allow(clippy::cast_precision_loss)]
    pub fn transfer_percent(&self, sent: u64, total: u64) -> f64 {
        let fraction = if total == 0 {
            1.0
        } else {
            (sent.min(total) as f64) / (total as f64)
        };
        self.transfer.mul_add(fraction, self.prepare)
    }

    /// Percentage reached once the transfer is done.
    pub fn transferred(&self) -> f64 {
        self.prepare + self.transfer
    }

    /// Width of the finalize phase.
    pub fn finalize_width(&self) -> f64 {
        self.finalize
    }
}

/// Byte-level progress handle for [`PhasedUpload::transfer`].
#[derive(Debug, Clone)]
pub struct TransferProgress {
    reporter: ProgressReporter,
    split: PhaseSplit,
    total: u64,
}

impl TransferProgress {
    /// Report the cumulative number of bytes sent.
    ///
    /// Fails with `UploadError::Cancelled` once the upload was cancelled.
    pub fn bytes(&self, sent: u64) -> Result<(), UploadError> {
        self.reporter
            .report(self.split.transfer_percent(sent, self.total))
    }

    /// Fail with `UploadError::Cancelled` if the upload was cancelled.
    pub fn check(&self) -> Result<(), UploadError> {
        self.reporter.check()
    }

    /// Token that fires when the upload is cancelled.
    pub const fn cancellation(&self) -> &CancellationToken {
        self.reporter.cancellation()
    }

    /// Size of the file being transferred.
    pub const fn total(&self) -> u64 {
        self.total
    }
}

/// An upload split into prepare, transfer and finalize steps.
#[async_trait]
pub trait PhasedUpload: Send + Sync {
    /// State carried from `prepare` to `finalize` (a target path, a session).
    type Ticket: Send;

    /// Set up the upload.
    async fn prepare(&self, file: &FileHandle) -> Result<Self::Ticket, UploadError>;

    /// Move the bytes, reporting through `progress`.
    async fn transfer(
        &self,
        file: &FileHandle,
        ticket: &mut Self::Ticket,
        progress: &TransferProgress,
    ) -> Result<(), UploadError>;

    /// Commit the upload and produce its result.
    async fn finalize(
        &self,
        file: &FileHandle,
        ticket: Self::Ticket,
    ) -> Result<UploadOutput, UploadError>;

    /// Clean up after a failed or cancelled upload.
    async fn abort(&self, _ticket: Self::Ticket) {}
}

/// [`UploadTransport`] that runs a [`PhasedUpload`] with a [`PhaseSplit`].
#[derive(Debug, Clone)]
pub struct PhasedTransport<P> {
    inner: P,
    split: PhaseSplit,
}

impl<P: PhasedUpload> PhasedTransport<P> {
    /// Wrap `inner` with the default 10/80/10 split.
    pub fn new(inner: P) -> Self {
        Self::with_split(inner, PhaseSplit::default())
    }

    /// Wrap `inner` with a custom split.
    pub const fn with_split(inner: P, split: PhaseSplit) -> Self {
        Self { inner, split }
    }

    /// The wrapped upload.
    pub const fn inner(&self) -> &P {
        &self.inner
    }

    /// The phase split in use.
    pub const fn split(&self) -> PhaseSplit {
        self.split
    }
}

#[async_trait]
impl<P: PhasedUpload + 'static> UploadTransport for PhasedTransport<P> {
    async fn upload(
        &self,
        file: FileHandle,
        progress: ProgressReporter,
    ) -> Result<UploadOutput, UploadError> {
        progress.report(0.0)?;
        let mut ticket = self.inner.prepare(&file).await?;

        if let Err(e) = progress.report(self.split.prepared()) {
            self.inner.abort(ticket).await;
            return Err(e);
        }

        let transfer = TransferProgress {
            reporter: progress.clone(),
            split: self.split,
            total: file.size(),
        };
        let transferred = match self.inner.transfer(&file, &mut ticket, &transfer).await {
            Ok(()) => progress.report(self.split.transferred()),
            Err(e) => Err(e),
        };
        if let Err(e) = transferred {
            if e.is_cancelled() {
                tracing::debug!(target: "ferry.upload", file = file.name(), "Transfer cancelled");
            } else {
                tracing::debug!(
                    target: "ferry.upload",
                    file = file.name(),
                    error = %e,
                    "Transfer failed"
                );
            }
            self.inner.abort(ticket).await;
            return Err(e);
        }

        let output = self.inner.finalize(&file, ticket).await?;
        // Finalize already committed; a late cancellation cannot undo it
        let _ = progress.report(100.0);
        Ok(output)
    }
}
