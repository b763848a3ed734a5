use crate::config::SignalingConfig;
use crate::error::SignalingError;
use crate::signaling::SignalingEvent;
use crate::signaling::signaling_client::Shared;
use airwave_core::SignalMessage;
use airwave_core::utils::is_clean_close;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsFrame = Option<Result<Message, tokio_tungstenite::tungstenite::Error>>;

/// Close code reported when the peer closed without a status.
const NO_STATUS_CODE: u16 = 1005;

pub(crate) enum Command {
    Connect {
        room_id: Option<String>,
        reply: oneshot::Sender<Result<Url, SignalingError>>,
    },
    Close,
}

/// Owns the socket reader, the failover loop and the reconnect timer.
pub(crate) struct SignalingActor {
    config: SignalingConfig,
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<SignalingEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    reader: Option<SplitStream<WsStream>>,
    writer_task: Option<JoinHandle<()>>,
    endpoint_index: usize,
    reconnect_at: Option<Instant>,
}

impl SignalingActor {
    pub(crate) fn new(
        config: SignalingConfig,
        shared: Arc<Shared>,
        events: mpsc::UnboundedSender<SignalingEvent>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            config,
            shared,
            events,
            commands,
            reader: None,
            writer_task: None,
            endpoint_index: 0,
            reconnect_at: None,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Connect { room_id, reply }) => {
                        let result = self.handle_connect(room_id).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Close) => self.close_connection().await,
                    None => break,
                },

                frame = next_frame(&mut self.reader) => self.handle_frame(frame),

                _ = reconnect_timer(self.reconnect_at) => self.reconnect().await,
            }
        }

        self.drop_connection();
        debug!("Signaling actor stopped");
    }

    async fn handle_connect(&mut self, room_id: Option<String>) -> Result<Url, SignalingError> {
        self.shared.state.lock().room_id = room_id;

        let open_url = {
            let state = self.shared.state.lock();
            state.writer.as_ref().and(state.current_url.clone())
        };
        if let Some(url) = open_url {
            debug!(url = %url, "Reusing open relay connection");
            self.shared.announce();
            return Ok(url);
        }

        // An explicit connect supersedes a pending reconnect.
        self.reconnect_at = None;
        let url = self.connect_cycle(0).await?;
        self.shared.announce();
        Ok(url)
    }

    /// Walk the endpoints starting at `start`, one attempt each, bounded by
    /// `max_attempts`.
    async fn connect_cycle(&mut self, start: usize) -> Result<Url, SignalingError> {
        let endpoints = self.config.endpoints.clone();
        if endpoints.is_empty() {
            return Err(SignalingError::NoEndpoints);
        }

        let budget = endpoints
            .len()
            .min(self.config.max_attempts.max(1) as usize);
        let timeout_ms = self.config.connect_timeout_ms;
        let mut attempts = 0;

        for offset in 0..budget {
            let index = (start + offset) % endpoints.len();
            let url = &endpoints[index];
            attempts += 1;
            self.shared.state.lock().attempts = attempts;
            info!(attempt = attempts, max = budget, url = %url, "Connecting to relay");

            let failure = match timeout(self.config.connect_timeout(), connect_async(url.as_str())).await {
                Ok(Ok((stream, _))) => {
                    self.install(stream, url.clone(), index);
                    info!(url = %url, "Relay connection open");
                    let _ = self.events.send(SignalingEvent::Connected { url: url.clone() });
                    return Ok(url.clone());
                }
                Ok(Err(e)) => SignalingError::Connect {
                    url: url.clone(),
                    reason: e.to_string(),
                },
                Err(_) => SignalingError::Timeout {
                    url: url.clone(),
                    timeout_ms,
                },
            };
            warn!(attempt = attempts, max = budget, "{}", failure);
        }

        error!(attempts, "All relay endpoints failed");
        Err(SignalingError::Exhausted { attempts })
    }

    fn install(&mut self, stream: WsStream, url: Url, index: usize) {
        let (mut sink, reader) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        let writer_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        if let Some(previous) = self.writer_task.replace(writer_task) {
            previous.abort();
        }
        self.reader = Some(reader);
        self.endpoint_index = index;

        let mut state = self.shared.state.lock();
        state.writer = Some(tx);
        state.current_url = Some(url);
    }

    fn handle_frame(&mut self, frame: WsFrame) {
        match frame {
            Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
            Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                Ok(text) => self.dispatch(text),
                Err(e) => warn!("Dropping non UTF-8 relay frame: {}", e),
            },
            Some(Ok(Message::Close(frame))) => {
                let code = frame
                    .map(|f| u16::from(f.code))
                    .unwrap_or(NO_STATUS_CODE);
                if is_clean_close(code) {
                    info!(code, "Relay closed the connection");
                    self.drop_connection();
                    self.shared.state.lock().current_url = None;
                    let _ = self.events.send(SignalingEvent::Disconnected);
                } else {
                    self.schedule_reconnect(&format!("close code {code}"));
                }
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => self.schedule_reconnect(&e.to_string()),
            None => self.schedule_reconnect("stream ended"),
        }
    }

    fn dispatch(&self, text: &str) {
        let msg: SignalMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("{}", SignalingError::Protocol(e));
                return;
            }
        };

        let me = &self.shared.peer_id;
        if msg.sender() == Some(me) {
            debug!(kind = msg.kind(), "Ignoring self-originated message");
            return;
        }
        if msg.target().is_some_and(|target| target != me) {
            debug!(kind = msg.kind(), "Ignoring message addressed to another peer");
            return;
        }

        let from = msg.sender().cloned();
        let event = match (msg, from) {
            (SignalMessage::Joined { peer_count, .. }, _) => SignalingEvent::Joined { peer_count },
            (SignalMessage::RoomsList { rooms }, _) => SignalingEvent::RoomsList { rooms },
            (SignalMessage::Hello { .. }, Some(from)) => SignalingEvent::Hello { from },
            (SignalMessage::Offer { offer, .. }, Some(from)) => SignalingEvent::Offer { from, offer },
            (SignalMessage::Answer { answer, .. }, Some(from)) => {
                SignalingEvent::Answer { from, answer }
            }
            (SignalMessage::Ice { ice, .. }, Some(from)) => SignalingEvent::Candidate {
                from,
                candidate: ice,
            },
            (other, _) => {
                debug!(kind = other.kind(), "Ignoring relay message");
                return;
            }
        };
        let _ = self.events.send(event);
    }

    fn schedule_reconnect(&mut self, reason: &str) {
        self.drop_connection();
        let delay = self.config.reconnect_delay();
        warn!(reason, delay_ms = self.config.reconnect_delay_ms, "Relay connection lost, reconnecting");
        self.reconnect_at = Some(Instant::now() + delay);
    }

    /// Retry after an unclean close, starting at the endpoint after the one
    /// that dropped.
    async fn reconnect(&mut self) {
        self.reconnect_at = None;
        let next = (self.endpoint_index + 1) % self.config.endpoints.len().max(1);
        match self.connect_cycle(next).await {
            Ok(url) => {
                info!(url = %url, "Reconnected to relay");
                self.shared.announce();
            }
            Err(e) => {
                self.shared.state.lock().current_url = None;
                let _ = self.events.send(SignalingEvent::ConnectionError(e));
                let _ = self.events.send(SignalingEvent::Disconnected);
            }
        }
    }

    async fn close_connection(&mut self) {
        self.reconnect_at = None;
        let writer = self.shared.state.lock().writer.take();
        let Some(writer) = writer else {
            return;
        };

        let _ = writer.send(Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: Utf8Bytes::from_static("client closed"),
        })));
        drop(writer);

        // Let the writer flush the close frame before the reader goes away.
        if let Some(task) = self.writer_task.take() {
            let _ = task.await;
        }
        self.reader = None;
        self.shared.state.lock().current_url = None;
        info!("Relay connection closed by client");
        let _ = self.events.send(SignalingEvent::Disconnected);
    }

    fn drop_connection(&mut self) {
        self.shared.state.lock().writer = None;
        self.reader = None;
        if let Some(task) = self.writer_task.take() {
            task.abort();
        }
    }
}

async fn next_frame(reader: &mut Option<SplitStream<WsStream>>) -> WsFrame {
    match reader {
        Some(reader) => reader.next().await,
        None => std::future::pending().await,
    }
}

async fn reconnect_timer(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
