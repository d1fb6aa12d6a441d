pub mod admin;
pub mod health;
pub mod notification;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                                 live alert feed (WebSocket, ?token=)
///
/// /notifications                      list, clear all
/// /notifications/unread-count         unread count
/// /notifications/read-all             mark all read (POST)
/// /notifications/{id}                 delete
/// /notifications/{id}/read            mark read (POST)
///
/// /dispatch                           raise one alert by kind (admin)
/// /events                             report a domain action
///
/// /admin/expiry-scan                  run the expiry scanner (manager/admin)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/notifications", notification::router())
        .route("/dispatch", post(handlers::dispatch::dispatch))
        .route("/events", post(handlers::dispatch::domain_event))
        .nest("/admin", admin::router())
}
