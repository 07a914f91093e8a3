//! Transport adapters.

mod phased;

pub use phased::{PhaseSplit, PhasedTransport, PhasedUpload, TransferProgress};
