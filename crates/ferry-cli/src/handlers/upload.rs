//! `ferry upload`: copy files into a directory through the upload queue.

use std::future::Future;
use std::sync::Arc;

use ferry_core::{
    DeviceClass, FileHandle, LocalFile, UploadEvent, UploadId, UploadQueueConfig, UploadQueuePort,
};
use ferry_upload::{PhasedTransport, UploadQueueDeps, build_upload_queue};

use crate::commands::UploadArgs;
use crate::error::CliError;
use crate::local::LocalCopy;
use crate::render::{Summary, UploadRenderer};

/// Outcome of a run: the tallies plus whether the user interrupted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub summary: Summary,
    pub interrupted: bool,
}

impl UploadReport {
    /// Fail when any item failed, or when an interrupt cancelled something.
    pub fn check(&self) -> Result<(), CliError> {
        if self.summary.failed > 0 {
            return Err(CliError::UploadsFailed {
                failed: self.summary.failed,
                total: self.summary.total,
            });
        }
        if self.interrupted && self.summary.cancelled > 0 {
            return Err(CliError::Interrupted {
                cancelled: self.summary.cancelled,
            });
        }
        Ok(())
    }
}

/// Resolve the queue configuration: environment first, then flags.
///
/// `--concurrency` wins over `--mobile`, which wins over the environment.
pub fn resolve_config(args: &UploadArgs) -> Result<UploadQueueConfig, CliError> {
    let mut config = UploadQueueConfig::from_env()?;
    if args.mobile {
        config = config.with_concurrency(DeviceClass::Mobile.default_concurrency());
    }
    if let Some(n) = args.concurrency {
        config = config.with_concurrency(usize::from(n));
    }
    Ok(config)
}

fn open_files(args: &UploadArgs) -> Result<Vec<FileHandle>, CliError> {
    args.files
        .iter()
        .map(|path| {
            LocalFile::from_path(path)
                .map(|f| Arc::new(f) as FileHandle)
                .map_err(|e| CliError::Arguments(format!("{}: {e}", path.display())))
        })
        .collect()
}

/// Run `ferry upload`, cancelling everything on Ctrl-C.
pub async fn execute(args: &UploadArgs) -> Result<UploadReport, CliError> {
    let config = resolve_config(args)?;
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    run(args, config, UploadRenderer::stderr(), interrupt).await
}

/// Drive one upload run to completion.
///
/// When `interrupt` resolves every admitted item is cancelled and the run
/// continues until the queue reports it has drained.
pub async fn run<F>(
    args: &UploadArgs,
    config: UploadQueueConfig,
    mut renderer: UploadRenderer,
    interrupt: F,
) -> Result<UploadReport, CliError>
where
    F: Future<Output = ()>,
{
    let files = open_files(args)?;
    let transport = Arc::new(PhasedTransport::new(LocalCopy::new(
        &args.dest,
        args.chunk_size,
    )));
    let queue = build_upload_queue(UploadQueueDeps::new(transport).with_config(config));

    let mut events = queue.subscribe();
    let ids = queue.add_files(files, args.prefix.as_deref()).await;
    if ids.is_empty() {
        queue.shutdown().await;
        return Err(CliError::Arguments("no files were admitted".to_string()));
    }
    tracing::info!(
        admitted = ids.len(),
        concurrency = queue.concurrency(),
        dest = %args.dest.display(),
        "Uploading"
    );

    tokio::pin!(interrupt);
    let mut interrupted = false;
    let summary = loop {
        tokio::select! {
            () = &mut interrupt, if !interrupted => {
                interrupted = true;
                let cancelled = cancel_all(&queue, &ids).await;
                tracing::info!(cancelled, "Interrupted, cancelling uploads");
            }
            event = events.recv() => match event {
                Some(event) => {
                    log_event(&event);
                    if let Some(summary) = renderer.handle(&event) {
                        break summary;
                    }
                }
                None => break renderer.partial_summary(),
            },
        }
    };

    queue.shutdown().await;
    Ok(UploadReport {
        summary,
        interrupted,
    })
}

async fn cancel_all(queue: &dyn UploadQueuePort, ids: &[UploadId]) -> usize {
    let mut cancelled = 0;
    for id in ids {
        if queue.cancel(id).await {
            cancelled += 1;
        }
    }
    cancelled
}

fn log_event(event: &UploadEvent) {
    match event {
        UploadEvent::ItemError { item } => tracing::warn!(
            file = item.file_name(),
            error = item.error.as_deref().unwrap_or_default(),
            "Upload failed"
        ),
        UploadEvent::ItemCompleted { item } => {
            tracing::debug!(file = item.file_name(), "Upload completed");
        }
        _ => {}
    }
}
