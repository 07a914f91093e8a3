//! Upload queue for ferry.
//!
//! Bounded-concurrency upload scheduling on top of the ports in `ferry-core`:
//!
//! - `queue` - Pure item state machine and speed/ETA estimation
//! - `bus` - Event fan-out to subscriptions
//! - `manager` - Runner task, workers and the `UploadQueue` facade
//! - `transport` - Adapters implementing `UploadTransport`
//!
//! ```ignore
//! let queue = build_upload_queue(UploadQueueDeps::new(Arc::new(transport)));
//! let mut events = queue.subscribe();
//! let ids = queue.add_files(files, None).await;
//! while let Some(event) = events.recv().await {
//!     if let UploadEvent::QueueCompleted { .. } = event {
//!         break;
//!     }
//! }
//! ```

// Re-export core types for convenience
pub use ferry_core::config::{DeviceClass, UploadQueueConfig};
pub use ferry_core::ports::{
    ProgressReporter, UploadEventEmitterPort, UploadQueuePort, UploadTransport,
};
pub use ferry_core::upload::{
    FileHandle, QueueItem, QueueProgress, QueueSnapshot, UploadError, UploadEvent, UploadId,
    UploadOutput, UploadStatus, UploadSubscription,
};

pub mod bus;
pub mod queue;
pub mod transport;

mod manager;

pub use bus::EventBus;
pub use manager::{UploadQueue, UploadQueueDeps, build_upload_queue};
pub use queue::{ProgressOutcome, SpeedEstimator, UploadQueueState};
pub use transport::{PhaseSplit, PhasedTransport, PhasedUpload, TransferProgress};

// Dev-dependencies used only by integration tests
#[cfg(test)]
use mockall as _;
