//! Live subscription endpoint
//!
//! One WebSocket connection per dashboard client. Clients send
//! `{"action":"join","deviceId":...}` / `{"action":"leave",...}` frames and
//! receive a JSON event for every accepted reading in their joined groups.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::handlers::AppState;
use crate::hub::FanoutHub;

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum ClientFrame {
    Join {
        #[serde(rename = "deviceId")]
        device_id: String,
    },
    Leave {
        #[serde(rename = "deviceId")]
        device_id: String,
    },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Manage one subscriber connection after upgrade.
///
/// All of the connection's group memberships share a single outbound
/// channel; a sender task forwards hub events to the socket while the
/// current task processes join/leave frames. The hub is told about the
/// disconnect exactly once, on the way out.
async fn handle_socket(socket: WebSocket, hub: Arc<FanoutHub>) {
    let conn_id = hub.next_conn_id();
    tracing::info!(conn_id = %conn_id, "Subscriber connected");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode reading event");
                    continue;
                }
            };
            if sink.send(frame).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "Subscriber sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(ClientFrame::Join { device_id }) => hub.join(&conn_id, &device_id, tx.clone()),
                Ok(ClientFrame::Leave { device_id }) => hub.leave(&conn_id, &device_id),
                Err(e) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Ignoring malformed frame");
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    hub.on_disconnect(&conn_id);
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "Subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_frame_parsing() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"action":"join","deviceId":"dev-1"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Join { device_id } if device_id == "dev-1"));

        let frame: ClientFrame =
            serde_json::from_str(r#"{"action":"leave","deviceId":"dev-1"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Leave { device_id } if device_id == "dev-1"));

        assert!(serde_json::from_str::<ClientFrame>(r#"{"action":"subscribe"}"#).is_err());
    }
}
