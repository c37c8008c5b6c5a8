//! In-process pub/sub fan-out of chain events.
//!
//! Each subscriber registers a kind filter and receives events through its
//! own bounded channel. Publishing never blocks: a subscriber whose channel
//! is full (or closed) is dropped and counted, so one slow consumer cannot
//! stall block processing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

use keel_chain::{Event, EventKind, SigBlock};

/// Per-subscriber channel capacity.
pub const SUBSCRIBER_CAPACITY: usize = 100;

struct Subscriber {
    filter: EventKind,
    tx: mpsc::Sender<Event>,
}

/// Bounded multi-producer multi-consumer event fan-out.
pub struct EventStream {
    subscribers: Mutex<Vec<Subscriber>>,
    dropped: AtomicU64,
}

impl EventStream {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a subscriber with the given kind filter.
    pub fn subscribe(&self, filter: EventKind) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.subscribers
            .lock()
            .expect("subscriber list lock poisoned")
            .push(Subscriber { filter, tx });
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber list lock poisoned")
            .len()
    }

    /// Subscribers dropped for falling behind.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Deliver an event to every matching subscriber without blocking.
    pub fn publish(&self, event: &Event) {
        let mut dropped = 0u64;
        let mut subscribers = self
            .subscribers
            .lock()
            .expect("subscriber list lock poisoned");
        subscribers.retain(|sub| {
            if !event.kind.matches(sub.filter) {
                return true;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(action = %event.action, "slow event subscriber dropped");
                    dropped += 1;
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
        drop(subscribers);
        if dropped > 0 {
            self.dropped.fetch_add(dropped, Ordering::Relaxed);
        }
    }

    /// Publish a validated block and each of its transactions.
    pub fn publish_block(&self, sblk: &SigBlock) {
        let body = serde_json::to_string(sblk).expect("block serializes to JSON");
        self.publish(&Event::new(EventKind::Block, "validated", body));
        for stx in &sblk.block.txs {
            let body = serde_json::to_string(stx).expect("tx serializes to JSON");
            self.publish(&Event::new(EventKind::Tx, "validated", body));
        }
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind) -> Event {
        Event::new(kind, "validated", "{}".to_string())
    }

    #[tokio::test]
    async fn subscriber_receives_matching_kind() {
        let stream = EventStream::new();
        let mut rx = stream.subscribe(EventKind::Tx);
        stream.publish(&event(EventKind::Tx));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, EventKind::Tx);
    }

    #[tokio::test]
    async fn filter_excludes_other_kinds() {
        let stream = EventStream::new();
        let mut rx = stream.subscribe(EventKind::Block);
        stream.publish(&event(EventKind::Tx));
        stream.publish(&event(EventKind::Block));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, EventKind::Block);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn all_filter_receives_everything() {
        let stream = EventStream::new();
        let mut rx = stream.subscribe(EventKind::All);
        stream.publish(&event(EventKind::Tx));
        stream.publish(&event(EventKind::Block));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Tx);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::Block);
    }

    #[tokio::test]
    async fn slow_subscriber_is_dropped_not_blocking() {
        let stream = EventStream::new();
        let _rx = stream.subscribe(EventKind::Tx);
        for _ in 0..SUBSCRIBER_CAPACITY + 1 {
            stream.publish(&event(EventKind::Tx));
        }
        assert_eq!(stream.subscriber_count(), 0);
        assert_eq!(stream.dropped(), 1);
    }

    #[tokio::test]
    async fn closed_subscriber_is_pruned_silently() {
        let stream = EventStream::new();
        let rx = stream.subscribe(EventKind::All);
        drop(rx);
        stream.publish(&event(EventKind::Tx));
        assert_eq!(stream.subscriber_count(), 0);
        assert_eq!(stream.dropped(), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_fan_out() {
        let stream = EventStream::new();
        let mut rx1 = stream.subscribe(EventKind::All);
        let mut rx2 = stream.subscribe(EventKind::Tx);
        stream.publish(&event(EventKind::Tx));
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }
}
