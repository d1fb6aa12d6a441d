use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use fleetwatch_core::types::DbId;
use fleetwatch_events::{AlertFeed, FeedEvent, LocalAlertGate, Subscription, Toast};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use crate::ws::frames::{feed_frame, sync_frame, toast_frame};

type WsSink = SplitSink<WebSocket, Message>;

/// GET /api/v1/ws?token=...
///
/// Upgrades to a live feed for the authenticated user.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    auth: AuthUser,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, auth.user_id, state))
}

/// Manage a single feed session after upgrade.
///
///   1. Subscribes to the user's hub channel before reading the unread set,
///      so nothing raised in between is missed.
///   2. Spawns a sender task that writes the `sync` frame, then forwards hub
///      events, toasts and control frames.
///   3. Processes inbound messages on the current task.
///   4. Cleans up on disconnect; dropping the subscription deregisters it.
async fn handle_socket(socket: WebSocket, user_id: DbId, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id, "Feed session connected");

    let control = state.ws_manager.add(conn_id.clone(), user_id).await;
    let subscription = state.feed.subscribe(user_id);
    let toasts = state.toasts.subscribe();

    let (sink, mut stream) = socket.split();
    let session = Session {
        user_id,
        sink,
        gate: LocalAlertGate::default(),
    };
    let feed = state.feed.clone();
    let send_task = tokio::spawn(session.run(feed, subscription, toasts, control));

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id, "Feed session disconnected");
}

struct Session {
    user_id: DbId,
    sink: WsSink,
    gate: LocalAlertGate,
}

impl Session {
    async fn run(
        mut self,
        feed: std::sync::Arc<AlertFeed>,
        mut subscription: Subscription,
        mut toasts: broadcast::Receiver<Toast>,
        mut control: mpsc::UnboundedReceiver<Message>,
    ) {
        if self.sync(&feed).await.is_err() {
            return;
        }

        loop {
            let frame = tokio::select! {
                event = subscription.recv() => match event {
                    Some(event @ FeedEvent::Resync { .. }) => {
                        let frame = feed_frame(&event, &mut self.gate);
                        if self.send(&frame).await.is_err() || self.sync(&feed).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Some(event) => feed_frame(&event, &mut self.gate),
                    None => break,
                },
                toast = toasts.recv() => match toast {
                    Ok(toast) if toast.recipient_id == self.user_id => toast_frame(&toast),
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                message = control.recv() => match message {
                    Some(message) => {
                        let closing = matches!(message, Message::Close(_));
                        if self.sink.send(message).await.is_err() || closing {
                            break;
                        }
                        continue;
                    }
                    None => break,
                },
            };

            if self.send(&frame).await.is_err() {
                tracing::debug!(user_id = self.user_id, "WebSocket sink closed");
                break;
            }
        }
    }

    /// Send the current unread set.
    async fn sync(&mut self, feed: &AlertFeed) -> Result<(), axum::Error> {
        match feed.unread(self.user_id).await {
            Ok(unread) => {
                let frame = sync_frame(&unread, &mut self.gate);
                self.send(&frame).await
            }
            Err(e) => {
                tracing::warn!(user_id = self.user_id, error = %e, "Could not load unread alerts");
                Ok(())
            }
        }
    }

    async fn send(&mut self, frame: &Value) -> Result<(), axum::Error> {
        self.sink.send(Message::Text(frame.to_string().into())).await
    }
}
