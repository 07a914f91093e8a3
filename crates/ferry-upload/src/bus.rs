//! In-process event bus.
//!
//! Every subscriber gets its own unbounded channel, so publishing never
//! blocks the runner. Events reach subscribers in subscription order and,
//! per subscriber, in publication order. Subscribers whose receiving side is
//! gone are pruned on the next publish.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;

use ferry_core::ports::UploadEventEmitterPort;
use ferry_core::upload::{UploadEvent, UploadSubscription};

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    closed: bool,
    senders: Vec<(u64, mpsc::UnboundedSender<UploadEvent>)>,
}

/// Fan-out of queue events to any number of subscriptions.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Subscribers>>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new subscriber.
    ///
    /// Once the bus is closed the returned subscription yields no events.
    pub fn subscribe(&self) -> UploadSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut subs = lock(&self.inner);
            let id = subs.next_id;
            subs.next_id += 1;
            if !subs.closed {
                subs.senders.push((id, tx));
            }
            id
        };

        let weak: Weak<Mutex<Subscribers>> = Arc::downgrade(&self.inner);
        UploadSubscription::new(rx, move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).senders.retain(|(sub_id, _)| *sub_id != id);
            }
        })
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).senders.len()
    }

    /// Detach every subscriber and refuse new ones.
    ///
    /// Pending events stay readable; afterwards each subscription's `recv`
    /// returns `None`.
    pub fn close(&self) {
        let mut subs = lock(&self.inner);
        subs.closed = true;
        subs.senders.clear();
    }
}

impl UploadEventEmitterPort for EventBus {
    fn emit(&self, event: UploadEvent) {
        let mut subs = lock(&self.inner);
        let before = subs.senders.len();
        subs.senders.retain(|(_, tx)| tx.send(event.clone()).is_ok());

        let pruned = before - subs.senders.len();
        if pruned > 0 {
            tracing::debug!(target: "ferry.upload", pruned, "Pruned closed subscribers");
        }
    }

    fn clone_box(&self) -> Box<dyn UploadEventEmitterPort> {
        Box::new(self.clone())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

fn lock(inner: &Mutex<Subscribers>) -> MutexGuard<'_, Subscribers> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::upload::QueueProgress;

    fn progress(total: usize) -> UploadEvent {
        UploadEvent::QueueProgress {
            progress: QueueProgress {
                total,
                ..QueueProgress::default()
            },
        }
    }

    fn total_of(event: &UploadEvent) -> usize {
        match event {
            UploadEvent::QueueProgress { progress } => progress.total,
            other => panic!("unexpected event {}", other.kind()),
        }
    }

    #[test]
    fn every_subscriber_sees_every_event_in_order() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(progress(1));
        bus.emit(progress(2));

        let seen: Vec<_> = first.drain().iter().map(total_of).collect();
        assert_eq!(seen, vec![1, 2]);
        let seen: Vec<_> = second.drain().iter().map(total_of).collect();
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn unsubscribe_detaches() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        let _kept = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 1);
        bus.emit(progress(1));
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.emit(progress(1));
        let mut sub = bus.subscribe();
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn close_ends_subscriptions() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.emit(progress(3));
        bus.close();

        tokio_test::block_on(async {
            assert_eq!(sub.recv().await.as_ref().map(total_of), Some(3));
            assert!(sub.recv().await.is_none());
        });

        let mut late = bus.subscribe();
        assert!(tokio_test::block_on(late.recv()).is_none());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
