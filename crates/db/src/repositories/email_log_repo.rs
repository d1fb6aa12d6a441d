//! Repository for the `email_logs` ledger.

use fleetwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::email_log::NewEmailLog;

pub struct EmailLogRepo;

impl EmailLogRepo {
    /// Record one send attempt, returning the generated ID.
    pub async fn insert(pool: &PgPool, input: &NewEmailLog) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO email_logs (to_email, template, subject, status, provider_id, error, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id",
        )
        .bind(&input.to_email)
        .bind(&input.template)
        .bind(&input.subject)
        .bind(&input.status)
        .bind(&input.provider_id)
        .bind(&input.error)
        .bind(&input.metadata)
        .fetch_one(pool)
        .await
    }
}
