use airwave_core::{IceCandidate, PeerId};
use std::fmt;

/// Identifies one transport instance for one remote peer.
///
/// The generation increases every time the peer's transport is replaced, so
/// late events from a torn-down transport can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub peer: PeerId,
    pub generation: u64,
}

impl ChannelKey {
    pub fn new(peer: PeerId, generation: u64) -> Self {
        Self { peer, generation }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.peer, self.generation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    CandidateGenerated(ChannelKey, IceCandidate),
    TrackReceived(ChannelKey),
    Connected(ChannelKey),
    /// Connectivity dropped but may come back on its own.
    Interrupted(ChannelKey),
    /// The channel failed or was closed and will not recover.
    Disconnected(ChannelKey),
}

impl TransportEvent {
    pub fn key(&self) -> &ChannelKey {
        match self {
            Self::CandidateGenerated(key, _)
            | Self::TrackReceived(key)
            | Self::Connected(key)
            | Self::Interrupted(key)
            | Self::Disconnected(key) => key,
        }
    }
}
