//! Manual trigger for the expiry scanner.

use axum::extract::State;
use axum::Json;
use fleetwatch_events::ScanReport;
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::rbac::RequireStaff;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: ScanReport,
}

/// POST /api/v1/admin/expiry-scan
///
/// Run one scan now and return its counters. Requires manager or admin.
pub async fn trigger_expiry_scan(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
) -> AppResult<Json<ScanResponse>> {
    tracing::info!(user_id = user.user_id, "Manual expiry scan requested");

    let report = state.scanner.run_once().await?;

    Ok(Json(ScanResponse {
        success: true,
        report,
    }))
}
