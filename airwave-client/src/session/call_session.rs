use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::media::{
    AudioConstraints, CaptureDevice, CaptureProfile, Mixer, OutboundQuality, ProfileReport,
    SourceId,
};
use crate::negotiation::Negotiator;
use crate::session::SessionEvent;
use crate::signaling::{SignalingClient, SignalingEvent};
use crate::transport::{RtcTransportFactory, TransportConfig, TransportEvent, TransportFactory};
use airwave_core::{IceCandidate, PeerId, Route, SessionDescription, SignalMessage};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    None,
    Broadcaster,
    Listener,
}

impl CallRole {
    pub fn is_in_call(self) -> bool {
        self != CallRole::None
    }
}

/// One node of a call: relay connection, per-peer negotiation and the
/// local audio mix, driven by [`CallSession::next_event`].
///
/// Offers only start after a listener announces itself with `hello`, and
/// only a declared broadcaster answers that announcement.
pub struct CallSession {
    signaling: SignalingClient,
    signaling_rx: mpsc::UnboundedReceiver<SignalingEvent>,
    negotiator: Negotiator,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    mixer: Mixer,
    device: Arc<dyn CaptureDevice>,
    role: CallRole,
    pending: VecDeque<SessionEvent>,
}

impl CallSession {
    /// Must be called inside a tokio runtime.
    pub fn new(
        config: ClientConfig,
        factory: Arc<dyn TransportFactory>,
        device: Arc<dyn CaptureDevice>,
    ) -> Self {
        let (signaling, signaling_rx) = SignalingClient::new(config.signaling, PeerId::new());
        let (negotiator, transport_rx) = Negotiator::new(factory);

        Self {
            signaling,
            signaling_rx,
            negotiator,
            transport_rx,
            mixer: Mixer::new(),
            device,
            role: CallRole::None,
            pending: VecDeque::new(),
        }
    }

    /// Session backed by webrtc-rs transports using the configured ICE servers.
    pub fn with_webrtc(config: ClientConfig, device: Arc<dyn CaptureDevice>) -> Self {
        let factory = RtcTransportFactory::new(TransportConfig {
            ice_servers: config.ice_servers.clone(),
        });
        Self::new(config, Arc::new(factory), device)
    }

    pub fn peer_id(&self) -> &PeerId {
        self.signaling.peer_id()
    }

    pub fn role(&self) -> CallRole {
        self.role
    }

    pub fn signaling(&self) -> &SignalingClient {
        &self.signaling
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Connect without joining a room, for discovery.
    pub async fn connect(&self) -> Result<Url, ClientError> {
        Ok(self.signaling.connect("").await?)
    }

    pub async fn join(&self, room_id: &str) -> Result<Url, ClientError> {
        Ok(self.signaling.connect(room_id).await?)
    }

    /// Become the broadcaster, opening the default microphone if the mix
    /// has no source yet. On capture failure the role is unchanged.
    pub async fn declare_broadcaster(&mut self) -> Result<(), ClientError> {
        if self.mixer.sources().is_empty() {
            self.mixer
                .add_microphone(self.device.as_ref(), None)
                .await?;
        }
        self.role = CallRole::Broadcaster;
        info!(peer = %self.peer_id(), "Declared broadcaster");
        Ok(())
    }

    /// Become a listener and announce it to the room.
    pub fn declare_listener(&mut self) {
        self.role = CallRole::Listener;
        info!(peer = %self.peer_id(), "Declared listener");
        self.signaling.send(SignalMessage::hello());
    }

    pub async fn add_microphone(
        &self,
        constraints: Option<AudioConstraints>,
    ) -> Result<SourceId, ClientError> {
        Ok(self
            .mixer
            .add_microphone(self.device.as_ref(), constraints)
            .await?)
    }

    pub async fn share_system_audio(&self) -> Result<SourceId, ClientError> {
        Ok(self.mixer.add_system_audio(self.device.as_ref()).await?)
    }

    pub async fn set_quality(&self, quality: OutboundQuality) -> bool {
        self.mixer.set_outbound_quality(quality).await
    }

    pub fn apply_profile(&self, profile: CaptureProfile) -> ProfileReport {
        self.mixer.apply_profile(profile)
    }

    /// Tear the call down from any state.
    ///
    /// Leaves the room, closes every channel, releases all captures and
    /// drops the role. The relay connection stays open.
    pub async fn hangup(&mut self) {
        self.signaling.leave();
        self.negotiator.close_all().await;
        self.mixer.stop_all();
        self.role = CallRole::None;
        info!(peer = %self.peer_id(), "Hung up");
    }

    /// Drive the session until it has something to report.
    ///
    /// Returns `None` once the signaling client has stopped.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            tokio::select! {
                event = self.signaling_rx.recv() => match event {
                    Some(event) => self.on_signaling(event).await,
                    None => return None,
                },
                Some(event) = self.transport_rx.recv() => self.on_transport(event).await,
            }
        }
    }

    async fn on_signaling(&mut self, event: SignalingEvent) {
        match event {
            SignalingEvent::Connected { url } => self.pending.push_back(SessionEvent::Connected { url }),
            SignalingEvent::Joined { peer_count } => {
                let room_id = self.signaling.room_id().unwrap_or_default();
                self.pending.push_back(SessionEvent::Joined {
                    room_id,
                    peer_count,
                });
            }
            SignalingEvent::RoomsList { rooms } => {
                self.pending.push_back(SessionEvent::RoomsList { rooms })
            }
            SignalingEvent::Hello { from } => self.on_hello(from).await,
            SignalingEvent::Offer { from, offer } => self.on_offer(from, offer).await,
            SignalingEvent::Answer { from, answer } => self.on_answer(from, answer).await,
            SignalingEvent::Candidate { from, candidate } => {
                if !self.role.is_in_call() {
                    debug!(%from, "Ignoring candidate outside a call");
                    return;
                }
                self.negotiator.add_candidate(&from, candidate).await;
            }
            SignalingEvent::ConnectionError(e) => self.pending.push_back(SessionEvent::Error {
                message: e.to_string(),
            }),
            SignalingEvent::Disconnected => self.pending.push_back(SessionEvent::Disconnected),
        }
    }

    async fn on_hello(&mut self, from: PeerId) {
        if self.role != CallRole::Broadcaster {
            debug!(%from, role = ?self.role, "Ignoring hello");
            return;
        }

        info!(%from, "Listener announced, sending offer");
        match self.negotiator.create_offer(&from).await {
            Ok(offer) => {
                if let Some(sender) = self.negotiator.context(&from).and_then(|ctx| ctx.sender()) {
                    self.mixer.attach_sender(from.clone(), sender);
                    let quality = self.mixer.quality();
                    self.mixer.set_outbound_quality(quality).await;
                }
                self.signaling.send(SignalMessage::Offer {
                    route: Route::to(from),
                    offer,
                });
            }
            Err(e) => {
                self.mixer.detach_sender(&from);
                self.report(format!("Failed to offer to {from}: {e}"));
            }
        }
    }

    async fn on_offer(&mut self, from: PeerId, offer: SessionDescription) {
        if self.role != CallRole::Listener {
            debug!(%from, role = ?self.role, "Ignoring offer");
            return;
        }

        match self.negotiator.accept_offer(&from, &offer).await {
            Ok(Some(answer)) => {
                self.signaling.send(SignalMessage::Answer {
                    route: Route::to(from),
                    answer,
                });
            }
            Ok(None) => {}
            Err(e) => self.report(format!("Failed to answer {from}: {e}")),
        }
    }

    async fn on_answer(&mut self, from: PeerId, answer: SessionDescription) {
        if self.role != CallRole::Broadcaster {
            debug!(%from, role = ?self.role, "Ignoring answer");
            return;
        }

        if let Err(e) = self.negotiator.apply_answer(&from, &answer).await {
            self.mixer.detach_sender(&from);
            self.report(format!("Failed to apply answer from {from}: {e}"));
        }
    }

    async fn on_transport(&mut self, event: TransportEvent) {
        if !self.negotiator.is_current(event.key()) {
            debug!(channel = %event.key(), "Ignoring event from replaced transport");
            return;
        }

        match event {
            TransportEvent::CandidateGenerated(key, candidate) => {
                self.send_candidate(key.peer, candidate);
            }
            TransportEvent::TrackReceived(key) => {
                self.pending.push_back(SessionEvent::RemoteTrack {
                    peer: key.peer.clone(),
                });
                if self.negotiator.mark_established(&key) {
                    self.pending
                        .push_back(SessionEvent::Established { peer: key.peer });
                }
            }
            TransportEvent::Connected(key) => {
                if self.negotiator.mark_established(&key) {
                    self.pending
                        .push_back(SessionEvent::Established { peer: key.peer });
                }
            }
            TransportEvent::Interrupted(key) => {
                warn!(channel = %key, "Media channel interrupted, waiting for it to recover");
            }
            TransportEvent::Disconnected(key) => {
                warn!(channel = %key, "Media channel lost");
                self.negotiator.close(&key.peer).await;
                self.mixer.detach_sender(&key.peer);
                self.pending
                    .push_back(SessionEvent::PeerClosed { peer: key.peer });
            }
        }
    }

    fn send_candidate(&self, peer: PeerId, candidate: IceCandidate) {
        self.signaling.send(SignalMessage::Ice {
            route: Route::to(peer),
            ice: candidate,
        });
    }

    fn report(&mut self, message: String) {
        warn!("{}", message);
        self.pending.push_back(SessionEvent::Error { message });
    }
}
