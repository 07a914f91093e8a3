//! Core domain types and port definitions for ferry.
//!
//! `ferry-core` holds everything an upload queue and its adapters agree on:
//! item records, queue-wide progress, the event union, error types,
//! configuration, and the ports (traits) a queue implementation consumes and
//! exposes. It spawns no tasks and performs no network I/O.
//!
//! The queue itself lives in `ferry-upload`.

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod ports;
pub mod upload;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{ConfigError, DeviceClass, MOBILE_BREAKPOINT_PX, UploadQueueConfig};
pub use ports::{
    FanoutEmitter, ProgressReporter, UploadEventEmitterPort, UploadQueuePort, UploadTransport,
};
pub use upload::{
    FileHandle, FileInfo, LocalFile, QueueError, QueueItem, QueueProgress, QueueSnapshot,
    UploadError, UploadEvent, UploadFile, UploadId, UploadOutput, UploadStatus,
    UploadSubscription,
};
pub use utils::{format_eta, format_file_size, format_speed};
