//! Subscriber registry and note event fan-out.
//!
//! Each live subscriber is an [`EventSink`]. A broadcast snapshots the
//! registry, then delivers to every snapshotted sink concurrently. A sink
//! that fails or times out is unregistered and closed; nothing is raised to
//! the caller.

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::join_all;
use notes_types::NoteEvent;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("subscriber connection closed")]
    Closed,
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Why the server ended a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// A delivery failed or timed out.
    DeliveryFailed,
    ShuttingDown,
}

/// Something a note event can be pushed to.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, event: &NoteEvent) -> Result<(), DeliveryError>;

    /// Release whatever connection backs the sink. Called once, after the
    /// sink has left the registry. Must not wait on the peer.
    async fn close(&self, _reason: DisconnectReason) {}
}

/// Sink backed by an mpsc channel, for in-process listeners.
/// Delivery fails once the receiver is dropped.
pub struct ChannelSink {
    tx: mpsc::Sender<NoteEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<NoteEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn deliver(&self, event: &NoteEvent) -> Result<(), DeliveryError> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| DeliveryError::Closed)
    }
}

/// Outcome of one broadcast pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct NoteEventBroadcaster {
    subscribers: DashMap<SubscriberId, Arc<dyn EventSink>>,
    next_id: AtomicU64,
    delivery_timeout: Duration,
}

impl NoteEventBroadcaster {
    pub fn new(delivery_timeout: Duration) -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            delivery_timeout,
        }
    }

    /// Add a sink to the live set. Every call gets a fresh id, so
    /// registering the same sink twice just means it is delivered to twice.
    pub fn register(&self, sink: Arc<dyn EventSink>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.insert(id, sink);
        log::info!(
            "[BROADCAST] Registered subscriber {} ({} live)",
            id,
            self.subscribers.len()
        );
        id
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            log::info!(
                "[BROADCAST] Unregistered subscriber {} ({} live)",
                id,
                self.subscribers.len()
            );
        }
        removed
    }

    /// Register a channel-backed subscriber and hand back its receiver.
    pub fn subscribe(&self, capacity: usize) -> (SubscriberId, mpsc::Receiver<NoteEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = self.register(Arc::new(ChannelSink::new(tx)));
        (id, rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    #[cfg(test)]
    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    /// Unregister a subscriber and close its sink. Returns false if it was
    /// already gone, in which case nothing is closed.
    pub async fn disconnect(&self, id: SubscriberId, reason: DisconnectReason) -> bool {
        let Some((_, sink)) = self.subscribers.remove(&id) else {
            return false;
        };
        log::info!(
            "[BROADCAST] Disconnected subscriber {} ({:?}, {} live)",
            id,
            reason,
            self.subscribers.len()
        );
        sink.close(reason).await;
        true
    }

    /// Disconnect every live subscriber. Returns how many were closed.
    pub async fn disconnect_all(&self, reason: DisconnectReason) -> usize {
        let ids: Vec<SubscriberId> = self.subscribers.iter().map(|entry| *entry.key()).collect();
        let mut closed = 0;
        for id in ids {
            if self.disconnect(id, reason).await {
                closed += 1;
            }
        }
        closed
    }

    /// Push `event` to every subscriber registered when the call starts.
    pub async fn broadcast(&self, event: NoteEvent) -> BroadcastReport {
        // Snapshot so the registry is never borrowed across an await and
        // concurrent (un)registration can't disturb this pass.
        let targets: Vec<(SubscriberId, Arc<dyn EventSink>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        if targets.is_empty() {
            log::debug!("[BROADCAST] No subscribers for {}", event.name());
            return BroadcastReport::default();
        }

        let timeout = self.delivery_timeout;
        let event = &event;
        let attempts = targets.iter().map(|(id, sink)| async move {
            let result = match tokio::time::timeout(timeout, sink.deliver(event)).await {
                Ok(result) => result,
                Err(_) => Err(DeliveryError::Timeout(timeout)),
            };
            (*id, result)
        });

        let mut report = BroadcastReport::default();
        for (id, result) in join_all(attempts).await {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    log::warn!(
                        "[BROADCAST] Dropping subscriber {} after failed {}: {}",
                        id,
                        event.name(),
                        e
                    );
                    self.disconnect(id, DisconnectReason::DeliveryFailed).await;
                    report.dropped += 1;
                }
            }
        }

        log::debug!(
            "[BROADCAST] {} delivered to {}, dropped {}",
            event.name(),
            report.delivered,
            report.dropped
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn delete_event(id: u64) -> NoteEvent {
        NoteEvent::DeleteNote { note_id: id }
    }

    struct FailingSink;

    #[async_trait]
    impl EventSink for FailingSink {
        async fn deliver(&self, _event: &NoteEvent) -> Result<(), DeliveryError> {
            Err(DeliveryError::Closed)
        }
    }

    /// Fails every delivery and records the reason it was closed with.
    #[derive(Default)]
    struct RecordingSink {
        fail: bool,
        closed: Mutex<Vec<DisconnectReason>>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn deliver(&self, _event: &NoteEvent) -> Result<(), DeliveryError> {
            if self.fail {
                Err(DeliveryError::Closed)
            } else {
                Ok(())
            }
        }

        async fn close(&self, reason: DisconnectReason) {
            self.closed.lock().push(reason);
        }
    }

    struct StalledSink;

    #[async_trait]
    impl EventSink for StalledSink {
        async fn deliver(&self, _event: &NoteEvent) -> Result<(), DeliveryError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    /// Unregisters another subscriber the first time it is delivered to,
    /// standing in for a disconnect racing the broadcast.
    struct DisconnectingSink {
        broadcaster: Arc<NoteEventBroadcaster>,
        victim: Mutex<Option<SubscriberId>>,
    }

    #[async_trait]
    impl EventSink for DisconnectingSink {
        async fn deliver(&self, _event: &NoteEvent) -> Result<(), DeliveryError> {
            if let Some(id) = self.victim.lock().take() {
                self.broadcaster.unregister(id);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers() {
        let broadcaster = NoteEventBroadcaster::new(Duration::from_secs(1));
        assert_eq!(broadcaster.broadcast(delete_event(1)).await, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_every_event() {
        let broadcaster = NoteEventBroadcaster::new(Duration::from_secs(1));
        let mut receivers: Vec<_> = (0..3).map(|_| broadcaster.subscribe(8).1).collect();

        for id in 1..=2 {
            let report = broadcaster.broadcast(delete_event(id)).await;
            assert_eq!(report, BroadcastReport { delivered: 3, dropped: 0 });
        }

        for rx in receivers.iter_mut() {
            assert_eq!(rx.recv().await, Some(delete_event(1)));
            assert_eq!(rx.recv().await, Some(delete_event(2)));
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_dropped_and_misses_later_events() {
        let broadcaster = NoteEventBroadcaster::new(Duration::from_secs(1));
        let (_a, mut rx_a) = broadcaster.subscribe(8);
        let (b, rx_b) = broadcaster.subscribe(8);

        drop(rx_b);
        let report = broadcaster.broadcast(delete_event(1)).await;
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(!broadcaster.is_registered(b));
        assert_eq!(broadcaster.subscriber_count(), 1);

        let report = broadcaster.broadcast(delete_event(2)).await;
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 0 });
        assert_eq!(rx_a.recv().await, Some(delete_event(1)));
        assert_eq!(rx_a.recv().await, Some(delete_event(2)));
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_others() {
        let broadcaster = NoteEventBroadcaster::new(Duration::from_secs(1));
        let failing = broadcaster.register(Arc::new(FailingSink));
        let (_ok, mut rx) = broadcaster.subscribe(8);

        let report = broadcaster.broadcast(delete_event(5)).await;
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(!broadcaster.is_registered(failing));
        assert_eq!(rx.recv().await, Some(delete_event(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_sink_times_out_and_is_dropped() {
        let broadcaster = NoteEventBroadcaster::new(Duration::from_millis(50));
        let stalled = broadcaster.register(Arc::new(StalledSink));
        let (_ok, mut rx) = broadcaster.subscribe(8);

        let report = broadcaster.broadcast(delete_event(1)).await;
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(!broadcaster.is_registered(stalled));
        assert_eq!(rx.recv().await, Some(delete_event(1)));
    }

    #[tokio::test]
    async fn test_unregister_during_broadcast_is_safe() {
        let broadcaster = Arc::new(NoteEventBroadcaster::new(Duration::from_secs(1)));
        let disconnecting = Arc::new(DisconnectingSink {
            broadcaster: Arc::clone(&broadcaster),
            victim: Mutex::new(None),
        });
        broadcaster.register(disconnecting.clone());
        let (victim, _rx) = broadcaster.subscribe(8);
        *disconnecting.victim.lock() = Some(victim);

        // Both were live at broadcast start, so both are attempted.
        let report = broadcaster.broadcast(delete_event(1)).await;
        assert_eq!(report, BroadcastReport { delivered: 2, dropped: 0 });
        assert!(!broadcaster.is_registered(victim));

        let report = broadcaster.broadcast(delete_event(2)).await;
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 0 });
    }

    #[tokio::test]
    async fn test_register_and_unregister_are_idempotent_safe() {
        let broadcaster = NoteEventBroadcaster::new(Duration::from_secs(1));
        let (tx, mut rx) = mpsc::channel(8);
        let sink: Arc<dyn EventSink> = Arc::new(ChannelSink::new(tx));

        let first = broadcaster.register(Arc::clone(&sink));
        let second = broadcaster.register(sink);
        assert_ne!(first, second);

        let report = broadcaster.broadcast(delete_event(1)).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(rx.recv().await, Some(delete_event(1)));
        assert_eq!(rx.recv().await, Some(delete_event(1)));

        assert!(broadcaster.unregister(first));
        assert!(!broadcaster.unregister(first));
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_sink_is_closed_once_and_healthy_sink_is_not() {
        let broadcaster = NoteEventBroadcaster::new(Duration::from_secs(1));
        let failing = Arc::new(RecordingSink { fail: true, ..Default::default() });
        let healthy = Arc::new(RecordingSink::default());
        let failing_id = broadcaster.register(failing.clone());
        broadcaster.register(healthy.clone());

        let report = broadcaster.broadcast(delete_event(1)).await;
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(!broadcaster.is_registered(failing_id));
        assert_eq!(*failing.closed.lock(), vec![DisconnectReason::DeliveryFailed]);

        // Already gone: a second disconnect closes nothing.
        assert!(!broadcaster.disconnect(failing_id, DisconnectReason::ShuttingDown).await);
        assert_eq!(failing.closed.lock().len(), 1);
        assert!(healthy.closed.lock().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_all_closes_every_sink() {
        let broadcaster = NoteEventBroadcaster::new(Duration::from_secs(1));
        let sinks: Vec<Arc<RecordingSink>> = (0..3).map(|_| Arc::new(RecordingSink::default())).collect();
        for sink in &sinks {
            broadcaster.register(sink.clone());
        }
        let (_id, mut rx) = broadcaster.subscribe(8);

        assert_eq!(broadcaster.disconnect_all(DisconnectReason::ShuttingDown).await, 4);
        assert_eq!(broadcaster.subscriber_count(), 0);
        for sink in &sinks {
            assert_eq!(*sink.closed.lock(), vec![DisconnectReason::ShuttingDown]);
        }
        // The channel sender went with the sink.
        assert_eq!(rx.recv().await, None);
    }
}
