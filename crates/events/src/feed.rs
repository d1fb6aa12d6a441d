//! Recipient-facing feed operations.
//!
//! Every mutation is scoped to the calling recipient and, once committed,
//! is announced on the hub so the recipient's other sessions converge.

use std::sync::Arc;

use fleetwatch_core::types::DbId;
use fleetwatch_db::models::alert::{Alert, AlertFilter};

use crate::error::StoreError;
use crate::hub::{AlertHub, FeedEvent, Subscription};
use crate::store::AlertStore;

/// Page size when the caller does not ask for one.
pub const DEFAULT_LIMIT: i64 = 50;
/// Largest page a caller may request.
pub const MAX_LIMIT: i64 = 100;

/// Listing options as received from a client.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub unread_only: bool,
    pub kind: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FeedQuery {
    /// Clamp to a valid store filter.
    pub fn to_filter(&self) -> AlertFilter {
        AlertFilter {
            unread_only: self.unread_only,
            kind: self.kind.clone().filter(|k| !k.is_empty()),
            limit: self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: self.offset.unwrap_or(0).max(0),
        }
    }
}

pub struct AlertFeed {
    store: Arc<dyn AlertStore>,
    hub: Arc<AlertHub>,
}

impl AlertFeed {
    pub fn new(store: Arc<dyn AlertStore>, hub: Arc<AlertHub>) -> Self {
        Self { store, hub }
    }

    pub async fn list(&self, recipient_id: DbId, query: &FeedQuery) -> Result<Vec<Alert>, StoreError> {
        self.store.list(recipient_id, &query.to_filter()).await
    }

    /// All unread alerts, newest first, capped at [`MAX_LIMIT`].
    pub async fn unread(&self, recipient_id: DbId) -> Result<Vec<Alert>, StoreError> {
        let query = FeedQuery {
            unread_only: true,
            limit: Some(MAX_LIMIT),
            ..FeedQuery::default()
        };
        self.list(recipient_id, &query).await
    }

    pub async fn unread_count(&self, recipient_id: DbId) -> Result<i64, StoreError> {
        self.store.unread_count(recipient_id).await
    }

    pub async fn mark_read(&self, recipient_id: DbId, alert_id: DbId) -> Result<(), StoreError> {
        self.store.mark_read(recipient_id, alert_id).await?;
        self.hub
            .publish(recipient_id, FeedEvent::Read { ids: vec![alert_id] });
        Ok(())
    }

    pub async fn mark_all_read(&self, recipient_id: DbId) -> Result<u64, StoreError> {
        let updated = self.store.mark_all_read(recipient_id).await?;
        if updated > 0 {
            self.hub.publish(recipient_id, FeedEvent::AllRead);
        }
        Ok(updated)
    }

    pub async fn delete(&self, recipient_id: DbId, alert_id: DbId) -> Result<(), StoreError> {
        self.store.delete(recipient_id, alert_id).await?;
        self.hub
            .publish(recipient_id, FeedEvent::Deleted { ids: vec![alert_id] });
        Ok(())
    }

    pub async fn clear_all(&self, recipient_id: DbId) -> Result<u64, StoreError> {
        let deleted = self.store.clear_all(recipient_id).await?;
        if deleted > 0 {
            self.hub.publish(recipient_id, FeedEvent::Cleared);
        }
        Ok(deleted)
    }

    pub fn subscribe(&self, recipient_id: DbId) -> Subscription {
        self.hub.subscribe(recipient_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use fleetwatch_core::catalog::EventKind;
    use fleetwatch_core::types::EventData;
    use serde_json::json;

    use crate::memory::MemoryBackend;
    use crate::notifier::{Notifier, NotifierConfig};

    struct Fixture {
        feed: AlertFeed,
        notifier: Notifier,
        hub: Arc<AlertHub>,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_recipients([1, 2]);
        let hub = Arc::new(AlertHub::default());
        Fixture {
            feed: AlertFeed::new(backend.clone(), hub.clone()),
            notifier: Notifier::new(backend, hub.clone(), NotifierConfig::default()),
            hub,
        }
    }

    async fn raise(f: &Fixture, recipient_id: DbId) -> DbId {
        let mut data = EventData::new();
        data.insert("new_role".into(), json!("manager"));
        f.notifier
            .notify(EventKind::UserRoleChanged, recipient_id, data)
            .await
            .unwrap()
            .alert()
            .unwrap()
            .id
    }

    #[test]
    fn query_is_clamped() {
        let filter = FeedQuery {
            limit: Some(1000),
            offset: Some(-5),
            kind: Some(String::new()),
            ..FeedQuery::default()
        }
        .to_filter();
        assert_eq!(filter.limit, MAX_LIMIT);
        assert_eq!(filter.offset, 0);
        assert_eq!(filter.kind, None);
        assert_eq!(FeedQuery::default().to_filter().limit, DEFAULT_LIMIT);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let f = fixture();
        let first = raise(&f, 1).await;
        let second = raise(&f, 1).await;
        let ids: Vec<DbId> = f
            .feed
            .list(1, &FeedQuery::default())
            .await
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn foreign_alert_cannot_be_touched() {
        let f = fixture();
        let theirs = raise(&f, 2).await;

        assert_matches!(f.feed.mark_read(1, theirs).await, Err(StoreError::NotOwner { .. }));
        assert_matches!(f.feed.delete(1, theirs).await, Err(StoreError::NotOwner { .. }));
        assert_eq!(f.feed.unread_count(2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn read_state_survives_repeat_marks() {
        let f = fixture();
        let id = raise(&f, 1).await;
        f.feed.mark_read(1, id).await.unwrap();
        let first = f.feed.list(1, &FeedQuery::default()).await.unwrap()[0].read_at;
        f.feed.mark_read(1, id).await.unwrap();
        f.feed.mark_all_read(1).await.unwrap();
        let alert = &f.feed.list(1, &FeedQuery::default()).await.unwrap()[0];
        assert!(alert.read);
        assert_eq!(alert.read_at, first);
    }

    #[tokio::test]
    async fn mutations_are_announced() {
        let f = fixture();
        let id = raise(&f, 1).await;
        let mut sub = f.hub.subscribe(1);

        f.feed.mark_read(1, id).await.unwrap();
        f.feed.delete(1, id).await.unwrap();
        raise(&f, 1).await;
        f.feed.clear_all(1).await.unwrap();

        assert_eq!(sub.recv().await, Some(FeedEvent::Read { ids: vec![id] }));
        assert_eq!(sub.recv().await, Some(FeedEvent::Deleted { ids: vec![id] }));
        assert_matches!(sub.recv().await, Some(FeedEvent::Created(_)));
        assert_eq!(sub.recv().await, Some(FeedEvent::Cleared));
    }

    #[tokio::test]
    async fn clear_all_only_touches_own_alerts() {
        let f = fixture();
        raise(&f, 1).await;
        raise(&f, 2).await;
        assert_eq!(f.feed.clear_all(1).await.unwrap(), 1);
        assert_eq!(f.feed.unread_count(2).await.unwrap(), 1);
    }
}
