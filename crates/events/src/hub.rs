//! Per-recipient live alert streams.
//!
//! Each recipient with at least one open subscription owns a
//! `tokio::sync::broadcast` channel. Channels are created on first
//! subscribe and removed when the last [`Subscription`] is dropped, so the
//! registry never holds senders nobody listens to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use fleetwatch_core::types::DbId;
use fleetwatch_db::models::alert::Alert;
use tokio::sync::broadcast;

/// Default per-recipient buffer before slow subscribers start lagging.
pub const DEFAULT_FANOUT_BUFFER: usize = 256;

/// A change to a recipient's feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Created(Alert),
    Read { ids: Vec<DbId> },
    AllRead,
    Deleted { ids: Vec<DbId> },
    Cleared,
    /// The subscriber fell behind and dropped `missed` events; it should
    /// reload the feed.
    Resync { missed: u64 },
}

/// Registry of per-recipient broadcast channels.
pub struct AlertHub {
    channels: Mutex<HashMap<DbId, broadcast::Sender<FeedEvent>>>,
    capacity: usize,
}

impl AlertHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Build from `FANOUT_BUFFER`, falling back to [`DEFAULT_FANOUT_BUFFER`].
    pub fn from_env() -> Self {
        let capacity = std::env::var("FANOUT_BUFFER")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_FANOUT_BUFFER);
        Self::new(capacity)
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<DbId, broadcast::Sender<FeedEvent>>> {
        self.channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a live stream for `recipient_id`.
    pub fn subscribe(self: &Arc<Self>, recipient_id: DbId) -> Subscription {
        let mut channels = self.registry();
        let sender = channels
            .entry(recipient_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        let receiver = sender.subscribe();
        tracing::debug!(recipient_id, "Feed subscription opened");
        Subscription {
            recipient_id,
            receiver: Some(receiver),
            hub: Arc::downgrade(self),
        }
    }

    /// Deliver `event` to every open subscription of the recipient.
    ///
    /// Returns the number of subscriptions reached; zero is not an error.
    pub fn publish(&self, recipient_id: DbId, event: FeedEvent) -> usize {
        let channels = self.registry();
        match channels.get(&recipient_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn subscriber_count(&self, recipient_id: DbId) -> usize {
        self.registry()
            .get(&recipient_id)
            .map_or(0, |s| s.receiver_count())
    }

    /// Number of recipients with at least one open subscription.
    pub fn active_recipients(&self) -> usize {
        self.registry().len()
    }

    fn release(&self, recipient_id: DbId) {
        let mut channels = self.registry();
        if channels
            .get(&recipient_id)
            .is_some_and(|s| s.receiver_count() == 0)
        {
            channels.remove(&recipient_id);
            tracing::debug!(recipient_id, "Feed channel released");
        }
    }
}

impl Default for AlertHub {
    fn default() -> Self {
        Self::new(DEFAULT_FANOUT_BUFFER)
    }
}

/// A recipient's live stream. Dropping it unsubscribes.
pub struct Subscription {
    recipient_id: DbId,
    receiver: Option<broadcast::Receiver<FeedEvent>>,
    hub: Weak<AlertHub>,
}

impl Subscription {
    pub fn recipient_id(&self) -> DbId {
        self.recipient_id
    }

    /// Next event, in publish order. A lagged receiver yields one
    /// [`FeedEvent::Resync`] and then continues with the newest events.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        let receiver = self.receiver.as_mut()?;
        match receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(recipient_id = self.recipient_id, missed, "Feed subscriber lagged");
                Some(FeedEvent::Resync { missed })
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.receiver.take();
        if let Some(hub) = self.hub.upgrade() {
            hub.release(self.recipient_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn events_reach_only_their_recipient() {
        let hub = Arc::new(AlertHub::default());
        let mut a = hub.subscribe(1);
        let mut b = hub.subscribe(2);

        assert_eq!(hub.publish(1, FeedEvent::AllRead), 1);
        assert_eq!(hub.publish(2, FeedEvent::Cleared), 1);

        assert_eq!(a.recv().await, Some(FeedEvent::AllRead));
        assert_eq!(b.recv().await, Some(FeedEvent::Cleared));
    }

    #[tokio::test]
    async fn order_is_preserved() {
        let hub = Arc::new(AlertHub::default());
        let mut sub = hub.subscribe(7);
        for id in 1..=5 {
            hub.publish(7, FeedEvent::Deleted { ids: vec![id] });
        }
        for id in 1..=5 {
            assert_eq!(sub.recv().await, Some(FeedEvent::Deleted { ids: vec![id] }));
        }
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let hub = AlertHub::default();
        assert_eq!(hub.publish(3, FeedEvent::Cleared), 0);
        assert_eq!(hub.active_recipients(), 0);
    }

    #[test]
    fn dropping_last_subscription_releases_channel() {
        let hub = Arc::new(AlertHub::default());
        let first = hub.subscribe(4);
        let second = hub.subscribe(4);
        assert_eq!(hub.subscriber_count(4), 2);

        drop(first);
        assert_eq!(hub.active_recipients(), 1);
        drop(second);
        assert_eq!(hub.active_recipients(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_resync() {
        let hub = Arc::new(AlertHub::new(2));
        let mut sub = hub.subscribe(1);
        for _ in 0..5 {
            hub.publish(1, FeedEvent::AllRead);
        }
        assert_matches!(sub.recv().await, Some(FeedEvent::Resync { missed: 3 }));
        assert_eq!(sub.recv().await, Some(FeedEvent::AllRead));
    }
}
