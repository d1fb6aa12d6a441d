//! Internal entry points into the notifier.
//!
//! `POST /dispatch` raises one alert by kind name (admin only).
//! `POST /events` reports a domain action; recipients are resolved here.

use axum::extract::State;
use axum::Json;
use fleetwatch_core::types::DbId;
use fleetwatch_events::DomainEvent;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /dispatch`.
#[derive(Debug, Deserialize, Validate)]
pub struct DispatchRequest {
    #[validate(length(min = 1, max = 64))]
    pub kind: String,
    #[validate(range(min = 1))]
    pub recipient_id: DbId,
    #[serde(default = "empty_object")]
    pub data: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// POST /api/v1/dispatch
///
/// Returns the outcome (`created`, `deduplicated`, `ignored`) and the new
/// alert when one was created.
pub async fn dispatch(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(body): Json<DispatchRequest>,
) -> AppResult<Json<serde_json::Value>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let outcome = state
        .notifier
        .notify_named(&body.kind, body.recipient_id, body.data)
        .await?;

    tracing::debug!(
        admin_id = admin.user_id,
        kind = %body.kind,
        recipient_id = body.recipient_id,
        outcome = outcome.as_str(),
        "Dispatch request handled",
    );

    Ok(Json(json!({
        "data": {
            "outcome": outcome.as_str(),
            "alert": outcome.alert(),
        }
    })))
}

/// POST /api/v1/events
///
/// Notify the people affected by a domain action performed by the caller.
/// Delivery failures are counted in the summary, never returned as errors.
pub async fn domain_event(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(event): Json<DomainEvent>,
) -> AppResult<Json<DataResponse<fleetwatch_events::DispatchSummary>>> {
    let summary = state.domain.handle(auth.user_id, event).await;
    Ok(Json(DataResponse { data: summary }))
}
