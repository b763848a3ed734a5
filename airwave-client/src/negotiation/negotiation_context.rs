use crate::negotiation::{
    LocalDescriptionState, NegotiationRole, NegotiationState, RemoteDescriptionState,
};
use crate::transport::{ChannelKey, OutboundSender, PeerTransport};
use airwave_core::{IceCandidate, PeerId};
use std::collections::VecDeque;
use std::sync::Arc;

/// Negotiation progress with one remote peer over one transport.
pub struct NegotiationContext {
    pub(crate) key: ChannelKey,
    pub(crate) transport: Arc<dyn PeerTransport>,
    pub(crate) role: NegotiationRole,
    pub(crate) state: NegotiationState,
    pub(crate) local: LocalDescriptionState,
    pub(crate) remote: RemoteDescriptionState,
    /// Candidates that arrived before the remote description, oldest first.
    pub(crate) pending_candidates: VecDeque<IceCandidate>,
    pub(crate) sender: Option<Arc<dyn OutboundSender>>,
}

impl NegotiationContext {
    pub(crate) fn new(
        key: ChannelKey,
        transport: Arc<dyn PeerTransport>,
        role: NegotiationRole,
        pending_candidates: VecDeque<IceCandidate>,
    ) -> Self {
        Self {
            key,
            transport,
            role,
            state: NegotiationState::Idle,
            local: LocalDescriptionState::None,
            remote: RemoteDescriptionState::None,
            pending_candidates,
            sender: None,
        }
    }

    pub fn key(&self) -> &ChannelKey {
        &self.key
    }

    pub fn peer(&self) -> &PeerId {
        &self.key.peer
    }

    pub fn role(&self) -> NegotiationRole {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn local_description(&self) -> LocalDescriptionState {
        self.local
    }

    pub fn remote_description(&self) -> RemoteDescriptionState {
        self.remote
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn sender(&self) -> Option<Arc<dyn OutboundSender>> {
        self.sender.clone()
    }

    pub fn is_established(&self) -> bool {
        self.state == NegotiationState::Established
    }
}
