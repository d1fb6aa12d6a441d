//! Persistence seams.
//!
//! The dispatch pipeline talks to storage only through these traits.
//! [`PgBackend`](crate::PgBackend) is the production implementation;
//! [`MemoryBackend`](crate::MemoryBackend) backs tests and local runs.

use async_trait::async_trait;
use chrono::NaiveDate;
use fleetwatch_core::types::{DbId, Timestamp};
use fleetwatch_db::models::alert::{Alert, AlertFilter, NewAlert};
use fleetwatch_db::models::email_log::NewEmailLog;
use fleetwatch_db::models::user::UserContact;
use fleetwatch_db::models::vehicle::Vehicle;

use crate::error::StoreError;

/// Durable alert storage with an atomic dedup gate.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Insert unless an alert with the same `(recipient_id, dedup_key)`
    /// exists. `Ok(None)` means the insert was absorbed. Concurrent calls
    /// with the same key produce at most one row.
    async fn insert_deduped(&self, alert: NewAlert) -> Result<Option<Alert>, StoreError>;

    /// A recipient's alerts, newest first.
    async fn list(&self, recipient_id: DbId, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError>;

    async fn unread_count(&self, recipient_id: DbId) -> Result<i64, StoreError>;

    /// Mark one alert read. Idempotent; fails with `NotFound` or `NotOwner`.
    async fn mark_read(&self, recipient_id: DbId, alert_id: DbId) -> Result<(), StoreError>;

    /// Mark every unread alert of the recipient read; returns the count.
    async fn mark_all_read(&self, recipient_id: DbId) -> Result<u64, StoreError>;

    /// Delete one alert; fails with `NotFound` or `NotOwner`.
    async fn delete(&self, recipient_id: DbId, alert_id: DbId) -> Result<(), StoreError>;

    async fn clear_all(&self, recipient_id: DbId) -> Result<u64, StoreError>;

    /// Delete read alerts created before `cutoff`.
    async fn delete_read_older_than(&self, cutoff: Timestamp) -> Result<u64, StoreError>;

    /// Keep only the newest `keep` alerts of every recipient.
    async fn trim_per_recipient(&self, keep: i64) -> Result<u64, StoreError>;
}

/// Read access to the fleet records owned by the CRUD subsystem.
#[async_trait]
pub trait FleetRecords: Send + Sync {
    /// Vehicles with any deadline on or before `cutoff`.
    ///
    /// The outer error means nothing could be read; an inner error is a
    /// single record that failed and must not stop the others.
    async fn vehicles_due(
        &self,
        cutoff: NaiveDate,
    ) -> Result<Vec<Result<Vehicle, StoreError>>, StoreError>;
}

/// User lookups for addressing alerts and email.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Contact details of an active user.
    async fn contact(&self, user_id: DbId) -> Result<Option<UserContact>, StoreError>;

    /// Ids of active users holding any of `roles`.
    async fn active_ids_by_roles(&self, roles: &[&str]) -> Result<Vec<DbId>, StoreError>;
}

/// Audit trail of email send attempts.
#[async_trait]
pub trait EmailLedger: Send + Sync {
    async fn record(&self, entry: NewEmailLog) -> Result<(), StoreError>;
}
