//! The single write path for alerts.
//!
//! [`Notifier::notify`] renders the event through the catalog, derives the
//! dedup key, inserts through the store's dedup gate, publishes the new
//! alert to the recipient's live streams and, for email kinds, hands it to
//! the email side-channel. Insert and publish for one recipient run under a
//! per-recipient lock, so subscribers see alerts in insertion order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use fleetwatch_core::catalog::{self, EventKind};
use fleetwatch_core::channels::Channel;
use fleetwatch_core::dedup::{self, DEFAULT_DEDUP_WINDOW_SECS};
use fleetwatch_core::types::{DbId, EventData};
use fleetwatch_db::models::alert::{Alert, NewAlert};

use crate::delivery::email::EmailSideChannel;
use crate::error::{NotifyError, StoreError};
use crate::hub::{AlertHub, FeedEvent};
use crate::store::AlertStore;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Width of a dedup time bucket in seconds.
    pub dedup_window_secs: i64,
    /// Reject unknown kind names instead of ignoring them.
    pub strict_catalog: bool,
}

impl NotifierConfig {
    /// | Variable            | Default                          |
    /// |---------------------|----------------------------------|
    /// | `DEDUP_WINDOW_HOURS`| `24`                             |
    /// | `CATALOG_STRICT`    | `true` in debug builds, else `false` |
    pub fn from_env() -> Self {
        let dedup_window_secs = std::env::var("DEDUP_WINDOW_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .map(|h| h * 3600)
            .unwrap_or(DEFAULT_DEDUP_WINDOW_SECS);
        let strict_catalog = std::env::var("CATALOG_STRICT")
            .ok()
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(cfg!(debug_assertions));
        Self {
            dedup_window_secs,
            strict_catalog,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: DEFAULT_DEDUP_WINDOW_SECS,
            strict_catalog: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum NotifyOutcome {
    Created(Alert),
    /// An equivalent alert already exists for the recipient. Not an error.
    Deduplicated,
    /// Unknown kind accepted in lenient mode; nothing was written.
    Ignored,
}

impl NotifyOutcome {
    pub fn alert(&self) -> Option<&Alert> {
        match self {
            NotifyOutcome::Created(alert) => Some(alert),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyOutcome::Created(_) => "created",
            NotifyOutcome::Deduplicated => "deduplicated",
            NotifyOutcome::Ignored => "ignored",
        }
    }
}

// ---------------------------------------------------------------------------
// Ordering locks
// ---------------------------------------------------------------------------

/// Per-recipient async locks; idle entries are removed.
#[derive(Default)]
struct RecipientLocks {
    locks: Mutex<HashMap<DbId, Arc<tokio::sync::Mutex<()>>>>,
}

/// A claim on one recipient's lock. Dropping it, even mid-wait when the
/// caller's future is cancelled, gives the entry back.
struct OrderingHandle<'a> {
    locks: &'a RecipientLocks,
    recipient_id: DbId,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for OrderingHandle<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.locks.lock().unwrap_or_else(|p| p.into_inner());
        // The map and this handle are the only owners: nobody else is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.recipient_id);
        }
    }
}

impl RecipientLocks {
    fn acquire(&self, recipient_id: DbId) -> OrderingHandle<'_> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        OrderingHandle {
            locks: self,
            recipient_id,
            lock: Arc::clone(locks.entry(recipient_id).or_default()),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

pub struct Notifier {
    store: Arc<dyn AlertStore>,
    hub: Arc<AlertHub>,
    email: Option<Arc<EmailSideChannel>>,
    config: NotifierConfig,
    ordering: RecipientLocks,
}

impl Notifier {
    pub fn new(store: Arc<dyn AlertStore>, hub: Arc<AlertHub>, config: NotifierConfig) -> Self {
        Self {
            store,
            hub,
            email: None,
            config,
            ordering: RecipientLocks::default(),
        }
    }

    /// Attach the email side-channel. Without one, email kinds only reach
    /// the live channels.
    pub fn with_email(mut self, email: Arc<EmailSideChannel>) -> Self {
        self.email = Some(email);
        self
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Raise an alert for `recipient_id`.
    pub async fn notify(
        &self,
        kind: EventKind,
        recipient_id: DbId,
        data: EventData,
    ) -> Result<NotifyOutcome, NotifyError> {
        if recipient_id <= 0 {
            return Err(NotifyError::Validation(format!(
                "recipient_id must be positive, got {recipient_id}"
            )));
        }

        let rendered = catalog::render(kind, &data);
        let channels = rendered.channels;
        let dedup_key = dedup::dedup_key(kind, &data, Utc::now(), self.config.dedup_window_secs)?;
        let new_alert = NewAlert {
            recipient_id,
            kind: kind.as_str().to_string(),
            category: rendered.category.as_str().to_string(),
            priority: rendered.priority.as_str().to_string(),
            title: rendered.title,
            message: rendered.message,
            action_url: kind.action_url(&data),
            metadata: serde_json::Value::Object(data),
            dedup_key,
        };

        let handle = self.ordering.acquire(recipient_id);
        let inserted = {
            let _guard = handle.lock.lock().await;
            let inserted = self.store.insert_deduped(new_alert).await;
            if let Ok(Some(alert)) = &inserted {
                self.hub.publish(recipient_id, FeedEvent::Created(alert.clone()));
            }
            inserted
        };
        drop(handle);

        let inserted = inserted.map_err(|e| match e {
            StoreError::UnknownRecipient(id) => {
                NotifyError::Validation(format!("Recipient {id} does not exist"))
            }
            other => other.into(),
        })?;
        match inserted {
            Some(alert) => {
                tracing::info!(
                    alert_id = alert.id,
                    recipient_id,
                    kind = %kind,
                    "Alert created",
                );
                if channels.contains(Channel::Email) {
                    if let Some(email) = &self.email {
                        email.enqueue(alert.clone());
                    }
                }
                Ok(NotifyOutcome::Created(alert))
            }
            None => {
                tracing::debug!(recipient_id, kind = %kind, "Alert deduplicated");
                Ok(NotifyOutcome::Deduplicated)
            }
        }
    }

    /// String entry point for callers outside the type system (the HTTP
    /// dispatch endpoint).
    ///
    /// Unknown names are a validation error in strict mode; otherwise they
    /// are logged and ignored.
    pub async fn notify_named(
        &self,
        kind: &str,
        recipient_id: DbId,
        data: serde_json::Value,
    ) -> Result<NotifyOutcome, NotifyError> {
        let serde_json::Value::Object(data) = data else {
            return Err(NotifyError::Validation("data must be a JSON object".into()));
        };
        match kind.parse::<EventKind>() {
            Ok(kind) => self.notify(kind, recipient_id, data).await,
            Err(e) if self.config.strict_catalog => Err(e.into()),
            Err(_) => {
                tracing::warn!(kind, recipient_id, "Ignoring unknown event kind");
                Ok(NotifyOutcome::Ignored)
            }
        }
    }
}
