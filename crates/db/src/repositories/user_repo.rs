//! Read-only queries against the `users` table.

use fleetwatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::UserContact;

pub struct UserRepo;

impl UserRepo {
    /// Contact details of an active user.
    pub async fn find_contact(pool: &PgPool, user_id: DbId) -> Result<Option<UserContact>, sqlx::Error> {
        sqlx::query_as::<_, UserContact>(
            "SELECT id, email, full_name, role FROM users WHERE id = $1 AND is_active = true",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Ids of every active user holding one of `roles`.
    pub async fn list_active_ids_by_roles(pool: &PgPool, roles: &[&str]) -> Result<Vec<DbId>, sqlx::Error> {
        let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        sqlx::query_scalar(
            "SELECT id FROM users WHERE role = ANY($1) AND is_active = true ORDER BY id",
        )
        .bind(roles)
        .fetch_all(pool)
        .await
    }
}
