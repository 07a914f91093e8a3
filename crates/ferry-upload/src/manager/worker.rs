//! Upload worker.
//!
//! A worker drives one dispatch of one item: it hands the file to the
//! transport and forwards progress and the final result to the runner as
//! commands tagged with the dispatch's lease. It never touches queue state.
//!
//! The transport runs in its own task so that a panic inside an adapter is
//! reported as a failed upload instead of losing the slot.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ferry_core::ports::{ProgressReporter, UploadTransport};
use ferry_core::upload::{FileHandle, UploadError, UploadId, UploadOutput};

use super::runner::{Command, LeaseId};

/// One dispatch to be executed by a worker.
pub(crate) struct UploadJob {
    pub id: UploadId,
    pub lease: LeaseId,
    pub file: FileHandle,
    pub cancel: CancellationToken,
}

/// Spawn a worker for `job`.
pub(crate) fn spawn(
    job: UploadJob,
    transport: Arc<dyn UploadTransport>,
    commands: mpsc::UnboundedSender<Command>,
) -> JoinHandle<()> {
    tokio::spawn(run_job(job, transport, commands))
}

async fn run_job(
    job: UploadJob,
    transport: Arc<dyn UploadTransport>,
    commands: mpsc::UnboundedSender<Command>,
) {
    let UploadJob {
        id,
        lease,
        file,
        cancel,
    } = job;

    let reporter = {
        let commands = commands.clone();
        let id = id.clone();
        ProgressReporter::new(cancel, move |percent, at| {
            let _ = commands.send(Command::Progress {
                id: id.clone(),
                lease,
                percent,
                at,
            });
        })
    };

    let result = execute(transport, file, reporter).await;

    if commands.send(Command::Settle { id, lease, result }).is_err() {
        tracing::debug!(target: "ferry.upload", lease = ?lease, "Runner gone before settle");
    }
}

async fn execute(
    transport: Arc<dyn UploadTransport>,
    file: FileHandle,
    reporter: ProgressReporter,
) -> Result<UploadOutput, UploadError> {
    let handle = tokio::spawn(async move { transport.upload(file, reporter).await });
    match handle.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(target: "ferry.upload", error = %e, "Upload task failed");
            Err(UploadError::other(format!("upload task failed: {e}")))
        }
    }
}
