//! Subcommands and their arguments.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Default copy buffer size (256 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Upload files into a destination directory
    Upload(UploadArgs),
}

/// Arguments for `ferry upload`.
#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Destination directory (created if missing)
    #[arg(short, long, env = "FERRY_DEST")]
    pub dest: PathBuf,

    /// Maximum simultaneous uploads (overrides FERRY_UPLOAD_CONCURRENCY)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,

    /// Use mobile defaults (one upload at a time)
    #[arg(long)]
    pub mobile: bool,

    /// Prefix for derived upload ids
    #[arg(long)]
    pub prefix: Option<String>,

    /// Copy buffer size in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
    pub chunk_size: usize,
}

fn parse_chunk_size(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("chunk size must be at least 1 byte".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}
