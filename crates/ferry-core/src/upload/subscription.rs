//! Receiving side of an event subscription.

use std::fmt;

use tokio::sync::mpsc;

use super::events::UploadEvent;

/// A live subscription to a queue's events.
///
/// Events arrive in the order they were published. Dropping the subscription
/// (or calling [`unsubscribe`](Self::unsubscribe)) detaches it from the queue.
pub struct UploadSubscription {
    rx: mpsc::UnboundedReceiver<UploadEvent>,
    on_detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl UploadSubscription {
    /// Wrap a receiver. `on_detach` runs once when the subscription is dropped.
    pub fn new(
        rx: mpsc::UnboundedReceiver<UploadEvent>,
        on_detach: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            rx,
            on_detach: Some(Box::new(on_detach)),
        }
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the queue has shut down and every buffered event
    /// has been received.
    pub async fn recv(&mut self) -> Option<UploadEvent> {
        self.rx.recv().await
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<UploadEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain every event buffered so far.
    pub fn drain(&mut self) -> Vec<UploadEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Stop receiving events.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for UploadSubscription {
    fn drop(&mut self) {
        if let Some(detach) = self.on_detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for UploadSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSubscription").finish_non_exhaustive()
    }
}
