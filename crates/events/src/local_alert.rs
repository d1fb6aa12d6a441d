//! Local (OS-level) alerts and transient toasts.
//!
//! A [`LocalAlert`] is the payload a connected client turns into a
//! system notification. Its `tag` is derived from the alert id, and each
//! live session runs a [`LocalAlertGate`] so the same alert is never shown
//! twice even if the session sees it more than once (for example after a
//! resync).

use std::collections::{HashSet, VecDeque};

use fleetwatch_core::types::DbId;
use fleetwatch_db::models::alert::Alert;
use serde::Serialize;
use tokio::sync::broadcast;

/// Tags remembered per session before the oldest are forgotten.
pub const DEFAULT_GATE_CAPACITY: usize = 256;

/// Payload for a client-side system notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalAlert {
    pub tag: String,
    pub title: String,
    pub body: String,
    /// High-priority alerts stay on screen until dismissed.
    pub require_interaction: bool,
    pub action_url: Option<String>,
}

impl LocalAlert {
    pub fn tag_for(alert_id: DbId) -> String {
        format!("alert-{alert_id}")
    }

    pub fn for_alert(alert: &Alert) -> Self {
        Self {
            tag: Self::tag_for(alert.id),
            title: alert.title.clone(),
            body: alert.message.clone(),
            require_interaction: alert.priority == "high",
            action_url: alert.action_url.clone(),
        }
    }
}

/// Bounded set of tags already shown in one session.
#[derive(Debug)]
pub struct LocalAlertGate {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl LocalAlertGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// `true` the first time `tag` is offered, `false` afterwards.
    pub fn admit(&mut self, tag: &str) -> bool {
        if self.seen.contains(tag) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(tag.to_string());
        self.order.push_back(tag.to_string());
        true
    }
}

impl Default for LocalAlertGate {
    fn default() -> Self {
        Self::new(DEFAULT_GATE_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Toasts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Error,
    Warning,
    Info,
}

impl ToastLevel {
    /// How long the client shows a toast of this level.
    pub fn duration_ms(self) -> u64 {
        match self {
            ToastLevel::Success | ToastLevel::Info => 4000,
            ToastLevel::Error => 6000,
            ToastLevel::Warning => 5000,
        }
    }
}

/// In-session feedback for the user who performed an action. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toast {
    pub recipient_id: DbId,
    pub level: ToastLevel,
    pub title: String,
    pub message: Option<String>,
    pub duration_ms: u64,
}

impl Toast {
    pub fn new(recipient_id: DbId, level: ToastLevel, title: impl Into<String>) -> Self {
        Self {
            recipient_id,
            level,
            title: title.into(),
            message: None,
            duration_ms: level.duration_ms(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Broadcast channel carrying toasts to live sessions.
///
/// Sessions filter on `recipient_id`; a toast with no live session is
/// dropped.
pub struct ToastBus {
    sender: broadcast::Sender<Toast>,
}

impl ToastBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, toast: Toast) {
        let _ = self.sender.send(toast);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.sender.subscribe()
    }
}

impl Default for ToastBus {
    fn default() -> Self {
        Self::new(DEFAULT_GATE_CAPACITY)
    }
}
