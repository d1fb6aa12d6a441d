//! Repository for the `alerts` table.

use fleetwatch_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::alert::{Alert, AlertFilter, NewAlert};

/// Column list for `alerts` queries.
const COLUMNS: &str = "id, recipient_id, kind, category, priority, title, message, metadata, \
     action_url, read, read_at, created_at, dedup_key";

/// Provides the write path, feed queries and retention deletes for alerts.
pub struct AlertRepo;

impl AlertRepo {
    /// Insert an alert unless one with the same `(recipient_id, dedup_key)`
    /// already exists.
    ///
    /// Returns `None` when the unique constraint absorbed the insert. The
    /// check and the write are one statement, so concurrent callers cannot
    /// both succeed.
    pub async fn insert_deduped(pool: &PgPool, input: &NewAlert) -> Result<Option<Alert>, sqlx::Error> {
        let query = format!(
            "INSERT INTO alerts \
                (recipient_id, kind, category, priority, title, message, metadata, action_url, dedup_key) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT ON CONSTRAINT uq_alerts_recipient_dedup_key DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(input.recipient_id)
            .bind(&input.kind)
            .bind(&input.category)
            .bind(&input.priority)
            .bind(&input.title)
            .bind(&input.message)
            .bind(&input.metadata)
            .bind(&input.action_url)
            .bind(&input.dedup_key)
            .fetch_optional(pool)
            .await
    }

    /// List a recipient's alerts, newest first.
    pub async fn list_for_recipient(
        pool: &PgPool,
        recipient_id: DbId,
        filter: &AlertFilter,
    ) -> Result<Vec<Alert>, sqlx::Error> {
        let unread = if filter.unread_only {
            "AND read = false"
        } else {
            ""
        };
        let query = format!(
            "SELECT {COLUMNS} FROM alerts \
             WHERE recipient_id = $1 {unread} AND ($2::text IS NULL OR kind = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Alert>(&query)
            .bind(recipient_id)
            .bind(&filter.kind)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(pool)
            .await
    }

    /// Get the number of unread alerts for a recipient.
    pub async fn unread_count(pool: &PgPool, recipient_id: DbId) -> Result<i64, sqlx::Error> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM alerts WHERE recipient_id = $1 AND read = false",
        )
        .bind(recipient_id)
        .fetch_one(pool)
        .await?;
        Ok(count.unwrap_or(0))
    }

    /// Owner of an alert, or `None` if the id does not exist.
    pub async fn owner_of(pool: &PgPool, alert_id: DbId) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT recipient_id FROM alerts WHERE id = $1")
            .bind(alert_id)
            .fetch_optional(pool)
            .await
    }

    /// Mark a single alert as read.
    ///
    /// Returns `true` if the alert exists for the given recipient. Calling it
    /// on an already-read alert succeeds and keeps the original `read_at`.
    pub async fn mark_read(
        pool: &PgPool,
        alert_id: DbId,
        recipient_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE alerts \
             SET read = true, read_at = COALESCE(read_at, NOW()) \
             WHERE id = $1 AND recipient_id = $2",
        )
        .bind(alert_id)
        .bind(recipient_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark all unread alerts as read for a recipient.
    ///
    /// Returns the number of alerts that were marked read.
    pub async fn mark_all_read(pool: &PgPool, recipient_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE alerts \
             SET read = true, read_at = NOW() \
             WHERE recipient_id = $1 AND read = false",
        )
        .bind(recipient_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete one alert owned by the recipient.
    pub async fn delete(pool: &PgPool, alert_id: DbId, recipient_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = $1 AND recipient_id = $2")
            .bind(alert_id)
            .bind(recipient_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every alert of a recipient.
    pub async fn clear_all(pool: &PgPool, recipient_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM alerts WHERE recipient_id = $1")
            .bind(recipient_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete read alerts created before `cutoff`. Unread alerts are kept.
    pub async fn delete_read_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM alerts WHERE read = true AND created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Keep only the newest `keep` alerts per recipient.
    pub async fn trim_per_recipient(pool: &PgPool, keep: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM alerts WHERE id IN ( \
                SELECT id FROM ( \
                    SELECT id, ROW_NUMBER() OVER ( \
                        PARTITION BY recipient_id ORDER BY created_at DESC, id DESC \
                    ) AS rn \
                    FROM alerts \
                ) ranked \
                WHERE rn > $1 \
             )",
        )
        .bind(keep)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
