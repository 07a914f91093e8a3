//! Upload event emitter port.
//!
//! This port abstracts event emission, allowing the queue runner to publish
//! events without coupling to delivery details (channels, SSE, desktop IPC).

use std::sync::Arc;

use crate::upload::UploadEvent;

/// Port for emitting upload events.
///
/// # Example
///
/// ```ignore
/// // In the queue runner
/// fn on_started(&self, emitter: &dyn UploadEventEmitterPort, item: QueueItem) {
///     emitter.emit(UploadEvent::ItemStarted { item });
/// }
/// ```
pub trait UploadEventEmitterPort: Send + Sync {
    /// Emit an upload event.
    ///
    /// Called from the queue runner; implementations must not block.
    fn emit(&self, event: UploadEvent);

    /// Clone this emitter into a boxed trait object.
    ///
    /// This enables cloning of `Arc<dyn UploadEventEmitterPort>` without
    /// requiring the underlying type to implement Clone.
    fn clone_box(&self) -> Box<dyn UploadEventEmitterPort>;
}

/// Emitter that forwards every event to several emitters in order.
#[derive(Clone, Default)]
pub struct FanoutEmitter {
    targets: Vec<Arc<dyn UploadEventEmitterPort>>,
}

impl FanoutEmitter {
    /// Create an emitter with no targets.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            targets: Vec::new(),
        }
    }

    /// Add a target; events reach targets in the order they were added.
    #[must_use]
    pub fn with(mut self, target: Arc<dyn UploadEventEmitterPort>) -> Self {
        self.targets.push(target);
        self
    }

    /// Number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether there are no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl UploadEventEmitterPort for FanoutEmitter {
    fn emit(&self, event: UploadEvent) {
        if let Some((last, rest)) = self.targets.split_last() {
            for target in rest {
                target.emit(event.clone());
            }
            last.emit(event);
        }
    }

    fn clone_box(&self) -> Box<dyn UploadEventEmitterPort> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::QueueProgress;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl UploadEventEmitterPort for Recorder {
        fn emit(&self, event: UploadEvent) {
            self.seen.lock().unwrap().push(event.kind());
        }

        fn clone_box(&self) -> Box<dyn UploadEventEmitterPort> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn fanout_reaches_every_target() {
        let first = Recorder::default();
        let second = Recorder::default();
        let fanout = FanoutEmitter::new()
            .with(Arc::new(first.clone()))
            .with(Arc::new(second.clone()));

        fanout.emit(UploadEvent::QueueProgress {
            progress: QueueProgress::default(),
        });

        assert_eq!(fanout.len(), 2);
        assert_eq!(*first.seen.lock().unwrap(), vec!["queue_progress"]);
        assert_eq!(*second.seen.lock().unwrap(), vec!["queue_progress"]);
    }

    #[test]
    fn empty_fanout_discards() {
        let fanout = FanoutEmitter::new();
        assert!(fanout.is_empty());
        fanout.emit(UploadEvent::QueueCompleted { items: vec![] });
    }
}
