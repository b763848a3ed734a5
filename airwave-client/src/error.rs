use crate::negotiation::NegotiationState;
use airwave_core::PeerId;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("No relay endpoints configured")]
    NoEndpoints,

    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: Url, reason: String },

    #[error("Timed out connecting to {url} after {timeout_ms} ms")]
    Timeout { url: Url, timeout_ms: u64 },

    #[error("All relay endpoints failed after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("Signaling connection is not open")]
    NotConnected,

    #[error("Malformed relay message: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("Signaling client has shut down")]
    Shutdown,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    WebRtc(#[from] webrtc::Error),

    #[error("Audio encoder failure: {0}")]
    Codec(#[from] opus::Error),

    #[error("Unsupported session description: {0}")]
    Description(String),

    #[error("Transport is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("Cannot {step} for {peer} in state {state:?}")]
    InvalidState {
        peer: PeerId,
        state: NegotiationState,
        step: &'static str,
    },

    #[error("No negotiation context for {0}")]
    UnknownPeer(PeerId),

    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Capture permission denied: {0}")]
    PermissionDenied(String),

    #[error("Capture device unavailable: {0}")]
    Unavailable(String),

    #[error("Constraint not supported: {0}")]
    Unsupported(String),

    #[error("Capture has ended")]
    Ended,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}
