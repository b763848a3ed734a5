use crate::error::SignalingError;
use airwave_core::{IceCandidate, PeerId, RoomSummary, SessionDescription};
use url::Url;

/// Inbound relay traffic and connection lifecycle, in arrival order.
#[derive(Debug)]
pub enum SignalingEvent {
    Connected { url: Url },
    Joined { peer_count: usize },
    RoomsList { rooms: Vec<RoomSummary> },
    Hello { from: PeerId },
    Offer { from: PeerId, offer: SessionDescription },
    Answer { from: PeerId, answer: SessionDescription },
    Candidate { from: PeerId, candidate: IceCandidate },
    /// Reconnection gave up after every endpoint failed.
    ConnectionError(SignalingError),
    Disconnected,
}
