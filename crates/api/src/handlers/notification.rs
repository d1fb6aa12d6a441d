//! Handlers for the `/notifications` resource.
//!
//! All endpoints require authentication via [`AuthUser`]; the caller is
//! always the recipient.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use fleetwatch_core::types::DbId;
use fleetwatch_db::models::alert::Alert;
use fleetwatch_events::feed::FeedQuery;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /notifications`.
#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    /// If `true`, return only unread alerts. Defaults to `false`.
    pub unread_only: Option<bool>,
    /// Restrict to one event kind.
    pub kind: Option<String>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

impl From<NotificationQuery> for FeedQuery {
    fn from(params: NotificationQuery) -> Self {
        FeedQuery {
            unread_only: params.unread_only.unwrap_or(false),
            kind: params.kind,
            limit: params.limit,
            offset: params.offset,
        }
    }
}

/// GET /api/v1/notifications
///
/// List the authenticated user's alerts, newest first.
pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<NotificationQuery>,
) -> AppResult<Json<DataResponse<Vec<Alert>>>> {
    let alerts = state.feed.list(auth.user_id, &params.into()).await?;
    Ok(Json(DataResponse { data: alerts }))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<serde_json::Value>> {
    let count = state.feed.unread_count(auth.user_id).await?;
    Ok(Json(json!({ "data": { "count": count } })))
}

/// POST /api/v1/notifications/{id}/read
///
/// Returns 204 on success, also when the alert was already read. An alert
/// owned by someone else is 403; an unknown id is 404.
pub async fn mark_read(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(alert_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state.feed.mark_read(auth.user_id, alert_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/notifications/read-all
pub async fn mark_all_read(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<serde_json::Value>> {
    let count = state.feed.mark_all_read(auth.user_id).await?;
    Ok(Json(json!({ "data": { "marked_read": count } })))
}

/// DELETE /api/v1/notifications/{id}
pub async fn delete_notification(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(alert_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state.feed.delete(auth.user_id, alert_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/notifications
///
/// Remove every alert of the authenticated user.
pub async fn clear_all(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<serde_json::Value>> {
    let deleted = state.feed.clear_all(auth.user_id).await?;
    Ok(Json(json!({ "data": { "deleted": deleted } })))
}
