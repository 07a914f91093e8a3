//! Command-line front end for the ferry upload queue.
//!
//! `ferry upload` copies local files into a destination directory through a
//! bounded-concurrency queue, with one progress bar per file.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tokio_util as _;

// Used by the binary only
use anyhow as _;
use dotenvy as _;
use tracing_subscriber as _;

pub mod commands;
pub mod error;
pub mod handlers;
pub mod local;
pub mod parser;
pub mod render;

pub use commands::{Commands, DEFAULT_CHUNK_SIZE, UploadArgs};
pub use error::CliError;
pub use local::{CopyTicket, LocalCopy};
pub use parser::Cli;
pub use render::{Summary, UploadRenderer};
