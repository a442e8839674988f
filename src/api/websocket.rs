//! WebSocket bridge from the subscriber hub to connected viewers
//!
//! Each connection owns one bounded queue on the hub; events are forwarded
//! as JSON text frames. If the hub drops the subscriber (queue overflow) the
//! event channel closes and the socket is shut down.

use super::handlers::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// `GET /ws` upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let (subscriber_id, mut events) = state.engine.subscribe().await;
    info!(
        "viewer {} connected (total: {})",
        subscriber_id,
        state.engine.subscriber_count()
    );

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Some(event) => event,
                    // Hub dropped us, most likely a queue overflow
                    None => {
                        warn!("viewer {} fell behind, closing", subscriber_id);
                        break;
                    }
                };

                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(err) => {
                        error!("failed to serialize round event: {}", err);
                        continue;
                    }
                };

                if sender.send(Message::Text(text)).await.is_err() {
                    debug!("viewer {} send failed, disconnecting", subscriber_id);
                    break;
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // viewers are read-only, ignore input
                    Some(Err(err)) => {
                        debug!("viewer {} socket error: {}", subscriber_id, err);
                        break;
                    }
                }
            }
        }
    }

    state.engine.unsubscribe(subscriber_id);
    info!(
        "viewer {} disconnected (remaining: {})",
        subscriber_id,
        state.engine.subscriber_count()
    );
}
