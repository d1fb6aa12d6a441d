//! Alert entity models and DTOs.

use fleetwatch_core::catalog::EventKind;
use fleetwatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `alerts` table.
///
/// Everything except `read` / `read_at` is immutable after insert.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Alert {
    pub id: DbId,
    pub recipient_id: DbId,
    pub kind: String,
    pub category: String,
    pub priority: String,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub action_url: Option<String>,
    pub read: bool,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
    #[serde(skip_serializing)]
    pub dedup_key: Option<String>,
}

impl Alert {
    /// Parsed event kind; `None` only for rows written by an older catalog.
    pub fn event_kind(&self) -> Option<EventKind> {
        self.kind.parse().ok()
    }
}

/// DTO for inserting an alert.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub recipient_id: DbId,
    pub kind: String,
    pub category: String,
    pub priority: String,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub action_url: Option<String>,
    pub dedup_key: Option<String>,
}

/// Listing filter for a recipient's feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub unread_only: bool,
    pub kind: Option<String>,
    pub limit: i64,
    pub offset: i64,
}
