//! WebSocket stream of shadow updates

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::{AppState, ShadowEvent};

/// WebSocket message types
#[derive(Serialize)]
#[serde(tag = "type", content = "data")]
enum WsMessage {
    /// Reported-state update document
    #[serde(rename = "shadow_update")]
    ShadowUpdate(Value),
    #[serde(rename = "shadow_cleared")]
    ShadowCleared,
    #[serde(rename = "pong")]
    Pong,
}

impl From<ShadowEvent> for WsMessage {
    fn from(event: ShadowEvent) -> Self {
        match event {
            ShadowEvent::Updated(snapshot) => Self::ShadowUpdate(snapshot.to_update_payload()),
            ShadowEvent::Cleared => Self::ShadowCleared,
        }
    }
}

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut shadow_events = state.subscribe();

    info!("WebSocket client connected");

    // Send the current snapshot on connect
    let current = WsMessage::ShadowUpdate(state.snapshot().await.to_update_payload());
    if let Ok(json) = serde_json::to_string(&current) {
        if sender.send(Message::Text(json.into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            event = shadow_events.recv() => {
                match event {
                    Ok(event) => {
                        let msg = WsMessage::from(event);
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "Shadow event channel lagged");
                    }
                    Err(e) => {
                        debug!(error = %e, "Shadow event channel error");
                        break;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        if text.as_str() == "ping" {
                            if let Ok(pong) = serde_json::to_string(&WsMessage::Pong) {
                                if sender.send(Message::Text(pong.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightwire_core::{LightSummary, ShadowSnapshot};
    use serde_json::json;

    #[test]
    fn test_shadow_update_message() {
        let snapshot = ShadowSnapshot::new(vec![LightSummary {
            name: "Desk".to_string(),
            uri: "/ocf/light/1".to_string(),
            power_on: true,
            brightness: 70,
        }]);
        let msg = WsMessage::from(ShadowEvent::Updated(snapshot));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "shadow_update");
        assert_eq!(
            value["data"]["state"]["reported"]["lightDevices"][0]["powerOn"],
            json!(true)
        );
    }

    #[test]
    fn test_cleared_message() {
        let value = serde_json::to_value(WsMessage::from(ShadowEvent::Cleared)).unwrap();
        assert_eq!(value, json!({ "type": "shadow_cleared" }));
    }
}
