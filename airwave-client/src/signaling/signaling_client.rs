use crate::config::SignalingConfig;
use crate::error::SignalingError;
use crate::signaling::SignalingEvent;
use crate::signaling::signaling_actor::{Command, SignalingActor};
use airwave_core::{PeerId, SignalMessage};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, warn};
use url::Url;

#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) room_id: Option<String>,
    pub(crate) current_url: Option<Url>,
    pub(crate) attempts: u32,
    pub(crate) writer: Option<mpsc::UnboundedSender<Message>>,
}

/// State shared between the client handle and its connection actor.
pub(crate) struct Shared {
    pub(crate) peer_id: PeerId,
    pub(crate) state: Mutex<SessionState>,
}

impl Shared {
    /// Queue one message on the open socket. Returns false when there is none.
    pub(crate) fn write(&self, msg: &SignalMessage) -> bool {
        let json = match serde_json::to_string(msg) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize {} message: {}", msg.kind(), e);
                return false;
            }
        };

        let state = self.state.lock();
        let Some(writer) = state.writer.as_ref() else {
            warn!(kind = msg.kind(), "{}, message dropped", SignalingError::NotConnected);
            return false;
        };
        if writer.send(Message::Text(json.into())).is_err() {
            warn!(kind = msg.kind(), "{}, message dropped", SignalingError::NotConnected);
            return false;
        }
        true
    }

    /// Send the join for the current room (if any) and ask for the room list.
    pub(crate) fn announce(&self) {
        let room = self.state.lock().room_id.clone();
        if let Some(room_id) = room {
            self.write(&SignalMessage::Join {
                room_id,
                id: self.peer_id.clone(),
            });
        }
        self.write(&SignalMessage::GetRooms);
    }
}

/// Client side of the relay connection.
///
/// One logical connection per client. Connecting walks the configured
/// endpoints in order with a per-attempt timeout; an unclean close schedules
/// a delayed reconnect that re-sends the last join.
pub struct SignalingClient {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    actor: JoinHandle<()>,
}

impl SignalingClient {
    /// Spawn the connection actor. Must be called inside a tokio runtime.
    pub fn new(
        config: SignalingConfig,
        peer_id: PeerId,
    ) -> (Self, mpsc::UnboundedReceiver<SignalingEvent>) {
        let shared = Arc::new(Shared {
            peer_id,
            state: Mutex::new(SessionState::default()),
        });
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let actor = SignalingActor::new(config, shared.clone(), events_tx, commands_rx);
        let actor = tokio::spawn(actor.run());

        (
            Self {
                shared,
                commands: commands_tx,
                actor,
            },
            events_rx,
        )
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.shared.peer_id
    }

    /// Open (or reuse) the relay connection and join `room_id`.
    ///
    /// An empty `room_id` connects for room discovery only. Either way the
    /// room list is requested once the connection is open.
    pub async fn connect(&self, room_id: &str) -> Result<Url, SignalingError> {
        let room_id = (!room_id.is_empty()).then(|| room_id.to_owned());
        let (reply_tx, reply_rx) = oneshot::channel();

        self.commands
            .send(Command::Connect {
                room_id,
                reply: reply_tx,
            })
            .map_err(|_| SignalingError::Shutdown)?;

        reply_rx.await.map_err(|_| SignalingError::Shutdown)?
    }

    /// Stamp `msg` with this peer and the current room, then send it.
    ///
    /// Without an open connection this logs a warning and drops the message.
    pub fn send(&self, mut msg: SignalMessage) -> bool {
        let room_id = self.shared.state.lock().room_id.clone();
        match &mut msg {
            SignalMessage::Leave { room_id: room, id } => {
                room.get_or_insert_with(|| room_id.clone().unwrap_or_default());
                id.get_or_insert_with(|| self.shared.peer_id.clone());
            }
            other => {
                if let Some(route) = other.route_mut() {
                    route.sender = Some(self.shared.peer_id.clone());
                    route.room_id = room_id;
                }
            }
        }
        self.shared.write(&msg)
    }

    /// Tell the relay we left and forget the room. The connection stays open.
    ///
    /// The room is only forgotten once the leave went out; while the
    /// connection is down it is kept so a reconnect joins it again.
    pub fn leave(&self) -> bool {
        let room = self.shared.state.lock().room_id.clone();
        let Some(room_id) = room else {
            return false;
        };

        let sent = self.shared.write(&SignalMessage::Leave {
            room_id: Some(room_id),
            id: Some(self.shared.peer_id.clone()),
        });
        if sent {
            self.shared.state.lock().room_id = None;
        }
        sent
    }

    pub fn get_rooms(&self) -> bool {
        self.shared.write(&SignalMessage::GetRooms)
    }

    /// Intentional disconnect with close code 1000. No reconnect follows.
    pub fn close(&self) {
        if self.commands.send(Command::Close).is_err() {
            warn!("Signaling actor already stopped");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().writer.is_some()
    }

    pub fn room_id(&self) -> Option<String> {
        self.shared.state.lock().room_id.clone()
    }

    pub fn current_endpoint(&self) -> Option<Url> {
        self.shared.state.lock().current_url.clone()
    }

    /// Attempts made in the current connect cycle.
    pub fn connection_attempts(&self) -> u32 {
        self.shared.state.lock().attempts
    }
}

impl Drop for SignalingClient {
    fn drop(&mut self) {
        self.actor.abort();
    }
}
