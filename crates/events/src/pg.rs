//! PostgreSQL implementation of the store traits.

use async_trait::async_trait;
use chrono::NaiveDate;
use fleetwatch_core::types::{DbId, Timestamp};
use fleetwatch_db::models::alert::{Alert, AlertFilter, NewAlert};
use fleetwatch_db::models::email_log::NewEmailLog;
use fleetwatch_db::models::user::UserContact;
use fleetwatch_db::models::vehicle::Vehicle;
use fleetwatch_db::repositories::{AlertRepo, EmailLogRepo, UserRepo, VehicleRepo};
use fleetwatch_db::DbPool;

use crate::error::StoreError;
use crate::store::{AlertStore, Directory, EmailLedger, FleetRecords};

/// Foreign key from `alerts.recipient_id` to `users.id`.
const RECIPIENT_FK: &str = "alerts_recipient_id_fkey";

/// Store backend that delegates to the `fleetwatch-db` repositories.
#[derive(Clone)]
pub struct PgBackend {
    pool: DbPool,
}

impl PgBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Distinguish a missing alert from one owned by someone else.
    async fn ownership_error(&self, recipient_id: DbId, alert_id: DbId) -> StoreError {
        match AlertRepo::owner_of(&self.pool, alert_id).await {
            Ok(Some(_)) => StoreError::NotOwner {
                alert_id,
                recipient_id,
            },
            Ok(None) => StoreError::NotFound(alert_id),
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl AlertStore for PgBackend {
    async fn insert_deduped(&self, alert: NewAlert) -> Result<Option<Alert>, StoreError> {
        match AlertRepo::insert_deduped(&self.pool, &alert).await {
            Ok(inserted) => Ok(inserted),
            Err(sqlx::Error::Database(db))
                if db.is_foreign_key_violation() && db.constraint() == Some(RECIPIENT_FK) =>
            {
                Err(StoreError::UnknownRecipient(alert.recipient_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, recipient_id: DbId, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
        Ok(AlertRepo::list_for_recipient(&self.pool, recipient_id, filter).await?)
    }

    async fn unread_count(&self, recipient_id: DbId) -> Result<i64, StoreError> {
        Ok(AlertRepo::unread_count(&self.pool, recipient_id).await?)
    }

    async fn mark_read(&self, recipient_id: DbId, alert_id: DbId) -> Result<(), StoreError> {
        if AlertRepo::mark_read(&self.pool, alert_id, recipient_id).await? {
            Ok(())
        } else {
            Err(self.ownership_error(recipient_id, alert_id).await)
        }
    }

    async fn mark_all_read(&self, recipient_id: DbId) -> Result<u64, StoreError> {
        Ok(AlertRepo::mark_all_read(&self.pool, recipient_id).await?)
    }

    async fn delete(&self, recipient_id: DbId, alert_id: DbId) -> Result<(), StoreError> {
        if AlertRepo::delete(&self.pool, alert_id, recipient_id).await? {
            Ok(())
        } else {
            Err(self.ownership_error(recipient_id, alert_id).await)
        }
    }

    async fn clear_all(&self, recipient_id: DbId) -> Result<u64, StoreError> {
        Ok(AlertRepo::clear_all(&self.pool, recipient_id).await?)
    }

    async fn delete_read_older_than(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        Ok(AlertRepo::delete_read_older_than(&self.pool, cutoff).await?)
    }

    async fn trim_per_recipient(&self, keep: i64) -> Result<u64, StoreError> {
        Ok(AlertRepo::trim_per_recipient(&self.pool, keep).await?)
    }
}

#[async_trait]
impl FleetRecords for PgBackend {
    async fn vehicles_due(
        &self,
        cutoff: NaiveDate,
    ) -> Result<Vec<Result<Vehicle, StoreError>>, StoreError> {
        let rows = VehicleRepo::list_due(&self.pool, cutoff).await?;
        Ok(rows
            .into_iter()
            .map(|row| row.map_err(StoreError::from))
            .collect())
    }
}

#[async_trait]
impl Directory for PgBackend {
    async fn contact(&self, user_id: DbId) -> Result<Option<UserContact>, StoreError> {
        Ok(UserRepo::find_contact(&self.pool, user_id).await?)
    }

    async fn active_ids_by_roles(&self, roles: &[&str]) -> Result<Vec<DbId>, StoreError> {
        Ok(UserRepo::list_active_ids_by_roles(&self.pool, roles).await?)
    }
}

#[async_trait]
impl EmailLedger for PgBackend {
    async fn record(&self, entry: NewEmailLog) -> Result<(), StoreError> {
        EmailLogRepo::insert(&self.pool, &entry).await?;
        Ok(())
    }
}
