//! Read-only view of the `users` table.

use fleetwatch_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

/// Contact details used by the email side-channel.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct UserContact {
    pub id: DbId,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
}
