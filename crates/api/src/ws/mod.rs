//! Live alert feed over WebSocket.
//!
//! Provides the session registry, heartbeat, frame encoding and the HTTP
//! upgrade handler used by Axum routes.

pub mod frames;
mod handler;
mod heartbeat;
pub mod manager;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
