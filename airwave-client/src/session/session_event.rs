use airwave_core::{PeerId, RoomSummary};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected { url: Url },
    Joined { room_id: String, peer_count: usize },
    RoomsList { rooms: Vec<RoomSummary> },
    Established { peer: PeerId },
    RemoteTrack { peer: PeerId },
    PeerClosed { peer: PeerId },
    Error { message: String },
    Disconnected,
}
