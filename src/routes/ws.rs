use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tracing::{debug, info, warn};

use crate::services::broadcast::Subscription;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(ws_handler))
}

/// Upgrade to a WebSocket that streams every live price update published
/// after the connection opens.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // Subscribe before the upgrade completes so nothing published in between is missed
    let subscription = state.broadcast.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, subscription))
}

async fn handle_socket(mut socket: WebSocket, mut subscription: Subscription) {
    info!("Live subscriber connected");

    loop {
        tokio::select! {
            update = subscription.recv() => {
                let Some(update) = update else { break };
                let payload = match serde_json::to_string(&update) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Failed to encode update for {}: {}", update.symbol, e);
                        continue;
                    }
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(other)) => debug!("Ignoring client frame: {:?}", other),
                }
            }
        }
    }

    info!("Live subscriber disconnected");
}
