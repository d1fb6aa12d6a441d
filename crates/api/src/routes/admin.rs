//! Routes mounted at `/admin`. Role checks live in the handlers' extractors.

use axum::routing::post;
use axum::Router;

use crate::handlers::scan;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/expiry-scan", post(scan::trigger_expiry_scan))
}
