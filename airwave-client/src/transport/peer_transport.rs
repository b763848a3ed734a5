use crate::error::TransportError;
use crate::transport::{ChannelKey, TransportEvent};
use airwave_core::{IceCandidate, SessionDescription};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Encoder parameters of one outbound encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodingParameters {
    pub max_bitrate: Option<u64>,
}

/// Sending half of a local audio track attached to a peer transport.
#[async_trait]
pub trait OutboundSender: Send + Sync {
    async fn encodings(&self) -> Vec<EncodingParameters>;

    async fn set_encodings(&self, encodings: Vec<EncodingParameters>)
    -> Result<(), TransportError>;

    /// Write one block of 48 kHz interleaved stereo samples.
    async fn write_frame(&self, samples: &[f32]) -> Result<(), TransportError>;
}

/// One direct media channel to a remote peer.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn add_local_audio(&self) -> Result<Arc<dyn OutboundSender>, TransportError>;

    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;

    async fn set_local_description(&self, desc: &SessionDescription) -> Result<(), TransportError>;

    async fn set_remote_description(&self, desc: &SessionDescription)
    -> Result<(), TransportError>;

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Builds a transport for a channel; the transport reports through `events`.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        key: ChannelKey,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError>;
}
