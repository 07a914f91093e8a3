//! Local-directory transport.
//!
//! `LocalCopy` "uploads" a file by copying it into a destination directory.
//! Every attempt writes into its own hidden temp file (`.{name}.XXXXXX.part`)
//! that is moved into place only after it has been flushed and synced, and
//! only if nothing already sits under the final name. The temp file is
//! deleted whenever the ticket is dropped without being persisted.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempPath;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use ferry_core::{FileHandle, UploadError, UploadOutput};
use ferry_upload::{PhasedUpload, TransferProgress};

/// Copies files into `dest`, reading `chunk_size` bytes at a time.
#[derive(Debug, Clone)]
pub struct LocalCopy {
    dest: PathBuf,
    chunk_size: usize,
}

/// Paths and open handle for one in-flight copy.
#[derive(Debug)]
pub struct CopyTicket {
    source: PathBuf,
    partial: TempPath,
    target: PathBuf,
    out: Option<File>,
    written: u64,
}

impl LocalCopy {
    pub fn new(dest: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            dest: dest.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }
}

fn io_err(err: &std::io::Error) -> UploadError {
    UploadError::from_io_error(err)
}

fn target_taken(target: &Path) -> UploadError {
    UploadError::rejected(format!("{} already exists", target.display()))
}

#[async_trait]
impl PhasedUpload for LocalCopy {
    type Ticket = CopyTicket;

    async fn prepare(&self, file: &FileHandle) -> Result<CopyTicket, UploadError> {
        let source = file
            .local_path()
            .map(Path::to_path_buf)
            .ok_or_else(|| UploadError::other(format!("{} has no local path", file.name())))?;

        fs::create_dir_all(&self.dest).await.map_err(|e| io_err(&e))?;

        let target = self.dest.join(file.name());
        if fs::try_exists(&target).await.unwrap_or(false) {
            return Err(target_taken(&target));
        }

        let (out, partial) = tempfile::Builder::new()
            .prefix(&format!(".{}.", file.name()))
            .suffix(".part")
            .tempfile_in(&self.dest)
            .map_err(|e| io_err(&e))?
            .into_parts();

        tracing::debug!(
            source = %source.display(),
            target = %target.display(),
            partial = %partial.display(),
            "Prepared local copy"
        );

        Ok(CopyTicket {
            source,
            partial,
            target,
            out: Some(File::from_std(out)),
            written: 0,
        })
    }

    async fn transfer(
        &self,
        _file: &FileHandle,
        ticket: &mut CopyTicket,
        progress: &TransferProgress,
    ) -> Result<(), UploadError> {
        let out = ticket
            .out
            .as_mut()
            .ok_or_else(|| UploadError::other("copy target already closed"))?;
        let mut input = File::open(&ticket.source).await.map_err(|e| io_err(&e))?;
        let mut buf = vec![0u8; self.chunk_size];

        loop {
            progress.check()?;
            let n = tokio::select! {
                () = progress.cancellation().cancelled() => return Err(UploadError::Cancelled),
                read = input.read(&mut buf) => read.map_err(|e| io_err(&e))?,
            };
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).await.map_err(|e| io_err(&e))?;
            ticket.written += n as u64;
            progress.bytes(ticket.written)?;
        }

        Ok(())
    }

    async fn finalize(
        &self,
        _file: &FileHandle,
        mut ticket: CopyTicket,
    ) -> Result<UploadOutput, UploadError> {
        // Any early return drops `ticket.partial`, which deletes the temp file
        if let Some(mut out) = ticket.out.take() {
            out.flush().await.map_err(|e| io_err(&e))?;
            out.sync_all().await.map_err(|e| io_err(&e))?;
        }

        let CopyTicket {
            partial,
            target,
            written,
            ..
        } = ticket;
        partial.persist_noclobber(&target).map_err(|e| {
            if e.error.kind() == ErrorKind::AlreadyExists {
                target_taken(&target)
            } else {
                io_err(&e.error)
            }
        })?;

        Ok(serde_json::json!({
            "path": target.display().to_string(),
            "bytes": written,
        }))
    }

    async fn abort(&self, mut ticket: CopyTicket) {
        drop(ticket.out.take());
        let path = ticket.partial.to_path_buf();
        if let Err(e) = ticket.partial.close() {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial copy");
        }
    }
}
