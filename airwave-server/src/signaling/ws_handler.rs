use crate::app::AppState;
use crate::room::EndpointId;
use airwave_core::utils::SERVER_SENDER;
use airwave_core::{PeerId, SignalMessage};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let endpoint = EndpointId::new();
    info!(%endpoint, "New relay connection");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.relay.add_endpoint(endpoint.clone(), tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();
        let endpoint = endpoint.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => handle_text(&state, &endpoint, text.as_str()),
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => handle_text(&state, &endpoint, text),
                        Err(e) => warn!(%endpoint, "Dropping non UTF-8 binary frame: {}", e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.registry.leave(&endpoint);
    state.relay.remove_endpoint(&endpoint);
    info!(%endpoint, "Relay connection closed");
}

/// Dispatch one inbound JSON envelope.
///
/// `join`, `leave` and `get_rooms` are handled here; any other kind is an
/// opaque payload forwarded to the rest of the sender's room.
pub(crate) fn handle_text(state: &AppState, endpoint: &EndpointId, text: &str) {
    let mut envelope: Map<String, Value> = match serde_json::from_str(text) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!(%endpoint, "Dropping relay message that is not a JSON object");
            return;
        }
        Err(e) => {
            warn!(%endpoint, "Invalid relay message: {}", e);
            return;
        }
    };

    let kind = envelope
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    match kind.as_str() {
        "get_rooms" => {
            let rooms = state.registry.list_rooms();
            state
                .relay
                .send_signal(endpoint, &SignalMessage::RoomsList { rooms });
        }

        "join" => {
            let Some(room_id) = envelope
                .get("roomId")
                .and_then(Value::as_str)
                .filter(|room| !room.is_empty())
            else {
                debug!(%endpoint, "Ignoring join without a room id");
                return;
            };

            let peer_count = state.registry.join(endpoint, room_id);
            state.relay.send_signal(
                endpoint,
                &SignalMessage::Joined {
                    peer_count,
                    sender: Some(PeerId::from(SERVER_SENDER)),
                },
            );
        }

        "leave" => {
            state.registry.leave(endpoint);
        }

        _ => {
            if !envelope.contains_key("sender") {
                envelope.insert("sender".to_owned(), Value::String(endpoint.to_string()));
            }
            let payload = Value::Object(envelope).to_string();
            let delivered = state.registry.broadcast(endpoint, &payload);
            debug!(%endpoint, kind = %kind, delivered, "Forwarded payload to room");
        }
    }
}
