mod peer;
mod room;
mod signaling;

pub use peer::PeerId;
pub use room::RoomSummary;
pub use signaling::{IceCandidate, IceServerConfig, Route, SdpKind, SessionDescription, SignalMessage};
