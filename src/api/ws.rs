//! WebSocket session: one hub connection per socket

use super::types::ClientFrame;
use super::AppState;
use crate::hub::Connection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let hub = state.room.hub().clone();
    let Connection { id, mut rx } = hub.join().await;
    let (mut sink, mut stream) = socket.split();

    // Writer: drain the hub queue into the socket
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(error = %e, kind = frame.kind(), "Failed to encode frame");
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // Pongs are queued by the socket itself while reading
    while let Some(result) = stream.next().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(connection = %id, error = %e, "WebSocket receive error");
                break;
            }
        };

        match message {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(ClientFrame::Send { content }) => {
                    let room = state.room.clone();
                    tokio::spawn(async move {
                        if let Err(e) = room.handle_user_message(&content).await {
                            tracing::error!(error = %e, "Failed to dispatch message");
                        }
                    });
                }
                Err(e) => {
                    tracing::debug!(connection = %id, error = %e, "Dropping malformed frame");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    hub.leave(id).await;
    writer.abort();
}
