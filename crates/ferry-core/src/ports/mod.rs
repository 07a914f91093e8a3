//! Port definitions (trait abstractions) for the upload queue.
//!
//! Ports describe what the queue needs from the outside world (a transport,
//! somewhere to publish events) and what it offers (`UploadQueuePort`).
//! Implementations live in `ferry-upload` and in adapters.

pub mod event_emitter;
pub mod transport;
pub mod upload_queue;

pub use event_emitter::{FanoutEmitter, UploadEventEmitterPort};
pub use transport::{ProgressReporter, UploadTransport};
pub use upload_queue::UploadQueuePort;
