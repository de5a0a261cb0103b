//! WebSocket route handler
//!
//! Pushes hub events to the dashboard and accepts `ping` and `refresh`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use pulse_core::{ClientMessage, ErrorCode, ServerMessage};
use pulse_services::HubEvent;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::AppState;

/// Create WebSocket routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn to_server_message(event: HubEvent) -> ServerMessage {
    match event {
        HubEvent::Snapshot(snapshot) => ServerMessage::Snapshot {
            snapshot: snapshot.as_ref().clone(),
        },
        HubEvent::Configuration(configuration) => ServerMessage::Configuration { configuration },
        HubEvent::Status(status) => ServerMessage::ConnectionStatus { status },
    }
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Subscribe before reading current state so nothing is missed in between
    let mut events = state.hub.subscribe();
    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<ServerMessage>(100);

    let initial = [
        ServerMessage::Configuration {
            configuration: state.hub.configuration(),
        },
        ServerMessage::ConnectionStatus {
            status: state.hub.connection_status(),
        },
        ServerMessage::Snapshot {
            snapshot: state.hub.snapshot().as_ref().clone(),
        },
    ];
    for message in initial {
        if outgoing_tx.send(message).await.is_err() {
            return;
        }
    }

    // Task: Forward hub events to this client
    let events_tx = outgoing_tx.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if events_tx.send(to_server_message(event)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged {} events", n);
                    let notice = ServerMessage::Error {
                        code: ErrorCode::Lagged,
                        message: format!("Missed {} updates", n),
                    };
                    if events_tx.send(notice).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Task: Send outgoing messages to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(message) = outgoing_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };

            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Receive and process incoming messages
    let hub = state.hub.clone();
    let recv_task = async move {
        while let Some(result) = ws_receiver.next().await {
            let text = match result {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!("WebSocket error: {}", e);
                    break;
                }
            };

            let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(ClientMessage::Refresh) => {
                    hub.refresh_data().await;
                    None
                }
                Ok(ClientMessage::Ping { timestamp }) => Some(ServerMessage::Pong {
                    client_timestamp: timestamp,
                    server_timestamp: Utc::now().timestamp_millis(),
                }),
                Err(e) => Some(ServerMessage::Error {
                    code: ErrorCode::InvalidMessage,
                    message: format!("Invalid JSON: {}", e),
                }),
            };

            if let Some(reply) = reply {
                if outgoing_tx.send(reply).await.is_err() {
                    break;
                }
            }
        }
    };

    // Wait for either side to finish (connection closed)
    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }

    forward_task.abort();
    info!("WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::{ConnectionStatus, Configuration};

    #[test]
    fn test_hub_events_map_to_tagged_messages() {
        let json = serde_json::to_value(to_server_message(HubEvent::Configuration(
            Configuration::default(),
        )))
        .unwrap();
        assert_eq!(json["type"], "configuration");
        assert_eq!(json["configuration"]["apiProvider"], "DUMMY");

        let json = serde_json::to_value(to_server_message(HubEvent::Status(
            ConnectionStatus::error("boom"),
        )))
        .unwrap();
        assert_eq!(json["type"], "connection_status");
        assert_eq!(json["status"]["state"], "error");
    }
}
