use crate::error::NegotiationError;
use crate::negotiation::{
    CandidateDisposition, LocalDescriptionState, NegotiationContext, NegotiationRole,
    NegotiationState, RemoteDescriptionState,
};
use crate::transport::{ChannelKey, TransportEvent, TransportFactory};
use airwave_core::{IceCandidate, PeerId, SessionDescription};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How many torn-down peers are remembered for discarding late candidates.
const RECENTLY_CLOSED: usize = 64;

/// Offer/answer/candidate sequencing for every remote peer of this node.
///
/// At most one context (and one live transport) exists per peer. Any failed
/// step tears the peer's context down so nothing is left half-negotiated.
pub struct Negotiator {
    factory: Arc<dyn TransportFactory>,
    events: mpsc::UnboundedSender<TransportEvent>,
    contexts: HashMap<PeerId, NegotiationContext>,
    early_candidates: HashMap<PeerId, VecDeque<IceCandidate>>,
    recently_closed: VecDeque<PeerId>,
    next_generation: u64,
}

impl Negotiator {
    /// The receiver yields events from every transport this negotiator opens.
    pub fn new(
        factory: Arc<dyn TransportFactory>,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                factory,
                events,
                contexts: HashMap::new(),
                early_candidates: HashMap::new(),
                recently_closed: VecDeque::new(),
                next_generation: 0,
            },
            events_rx,
        )
    }

    pub fn context(&self, peer: &PeerId) -> Option<&NegotiationContext> {
        self.contexts.get(peer)
    }

    pub fn state(&self, peer: &PeerId) -> Option<NegotiationState> {
        self.contexts.get(peer).map(|ctx| ctx.state)
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.contexts.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Candidates held for `peer` before any context existed.
    pub fn early_candidates(&self, peer: &PeerId) -> usize {
        self.early_candidates.get(peer).map_or(0, VecDeque::len)
    }

    /// Whether `key` names the live transport of its peer.
    pub fn is_current(&self, key: &ChannelKey) -> bool {
        self.contexts
            .get(&key.peer)
            .is_some_and(|ctx| ctx.key == *key)
    }

    /// Open a fresh offerer context for `peer` and produce an offer.
    ///
    /// An existing channel to the peer is closed first. The offer is applied
    /// locally before it is returned for transmission.
    pub async fn create_offer(
        &mut self,
        peer: &PeerId,
    ) -> Result<SessionDescription, NegotiationError> {
        self.open(peer, NegotiationRole::Offerer).await?;
        let result = self.run_offer(peer).await;
        if result.is_err() {
            self.close_context(peer).await;
        }
        result
    }

    /// Answer an offer from `peer`, replacing any prior context.
    ///
    /// Returns `None` when the offer is ignored because this node already
    /// has an established channel to the peer as offerer.
    pub async fn accept_offer(
        &mut self,
        peer: &PeerId,
        offer: &SessionDescription,
    ) -> Result<Option<SessionDescription>, NegotiationError> {
        if let Some(ctx) = self.contexts.get(peer)
            && ctx.role == NegotiationRole::Offerer
            && ctx.state == NegotiationState::Established
        {
            warn!(channel = %ctx.key, "Ignoring offer on established outbound channel");
            return Ok(None);
        }

        self.open(peer, NegotiationRole::Answerer).await?;
        let result = self.run_answer(peer, offer).await;
        if result.is_err() {
            self.close_context(peer).await;
        }
        result.map(Some)
    }

    /// Apply an answer from `peer`. Only valid in `OfferSent`; otherwise the
    /// answer is logged and ignored (`Ok(false)`).
    pub async fn apply_answer(
        &mut self,
        peer: &PeerId,
        answer: &SessionDescription,
    ) -> Result<bool, NegotiationError> {
        let Some(ctx) = self.contexts.get(peer) else {
            warn!(%peer, "Ignoring answer without negotiation context");
            return Ok(false);
        };
        if ctx.role != NegotiationRole::Offerer
            || ctx.state != NegotiationState::OfferSent
            || ctx.local != LocalDescriptionState::OfferSet
        {
            warn!(channel = %ctx.key, state = ?ctx.state, "Ignoring answer in unexpected state");
            return Ok(false);
        }

        let result = self.run_apply_answer(peer, answer).await;
        if result.is_err() {
            self.close_context(peer).await;
        }
        result.map(|()| true)
    }

    /// Apply a remote candidate now, or buffer it until a remote description
    /// exists. Buffered candidates are never dropped before that point.
    ///
    /// Candidates from a peer whose channel was just closed are trickle
    /// leftovers of that channel and are discarded instead of buffered.
    pub async fn add_candidate(
        &mut self,
        peer: &PeerId,
        candidate: IceCandidate,
    ) -> CandidateDisposition {
        let Some(ctx) = self.contexts.get_mut(peer) else {
            if self.recently_closed.contains(peer) {
                debug!(%peer, "Discarding candidate for closed channel");
                return CandidateDisposition::Discarded;
            }
            let buffer = self.early_candidates.entry(peer.clone()).or_default();
            buffer.push_back(candidate);
            debug!(%peer, buffered = buffer.len(), "Candidate buffered before context");
            return CandidateDisposition::Buffered;
        };

        if ctx.remote == RemoteDescriptionState::None {
            ctx.pending_candidates.push_back(candidate);
            debug!(channel = %ctx.key, buffered = ctx.pending_candidates.len(), "Candidate buffered");
            return CandidateDisposition::Buffered;
        }

        if let Err(e) = ctx.transport.add_ice_candidate(&candidate).await {
            warn!(channel = %ctx.key, "Remote candidate rejected: {}", e);
        }
        CandidateDisposition::Applied
    }

    /// Move the channel named by `key` to `Established`. Returns true on the
    /// transition; stale keys and repeats return false.
    pub fn mark_established(&mut self, key: &ChannelKey) -> bool {
        let Some(ctx) = self.contexts.get_mut(&key.peer) else {
            return false;
        };
        if ctx.key != *key || ctx.state == NegotiationState::Established {
            return false;
        }
        ctx.state = NegotiationState::Established;
        info!(channel = %key, role = ?ctx.role, "Media channel established");
        true
    }

    /// Close `peer`'s channel and discard everything buffered for it.
    pub async fn close(&mut self, peer: &PeerId) -> bool {
        self.early_candidates.remove(peer);
        self.close_context(peer).await
    }

    pub async fn close_all(&mut self) {
        let peers: Vec<PeerId> = self.contexts.keys().cloned().collect();
        for peer in peers {
            self.close_context(&peer).await;
        }
        self.early_candidates.clear();
    }

    async fn open(&mut self, peer: &PeerId, role: NegotiationRole) -> Result<(), NegotiationError> {
        if self.close_context(peer).await {
            info!(%peer, "Replaced existing channel");
        }

        self.next_generation += 1;
        let key = ChannelKey::new(peer.clone(), self.next_generation);
        let transport = self.factory.create(key.clone(), self.events.clone()).await?;
        self.recently_closed.retain(|closed| closed != peer);
        let early = self.early_candidates.remove(peer).unwrap_or_default();

        info!(channel = %key, ?role, buffered = early.len(), "Negotiation context opened");
        self.contexts.insert(
            peer.clone(),
            NegotiationContext::new(key, transport, role, early),
        );
        Ok(())
    }

    async fn run_offer(&mut self, peer: &PeerId) -> Result<SessionDescription, NegotiationError> {
        let ctx = self.context_mut(peer)?;
        if ctx.state != NegotiationState::Idle {
            return Err(NegotiationError::InvalidState {
                peer: peer.clone(),
                state: ctx.state,
                step: "create an offer",
            });
        }
        ctx.state = NegotiationState::OfferPending;

        let transport = ctx.transport.clone();
        ctx.sender = Some(transport.add_local_audio().await?);

        let offer = transport.create_offer().await?;
        ctx.local = LocalDescriptionState::OfferCreated;
        transport.set_local_description(&offer).await?;
        ctx.local = LocalDescriptionState::OfferSet;
        ctx.state = NegotiationState::OfferSent;

        info!(channel = %ctx.key, "Offer applied locally");
        Ok(offer)
    }

    async fn run_answer(
        &mut self,
        peer: &PeerId,
        offer: &SessionDescription,
    ) -> Result<SessionDescription, NegotiationError> {
        let ctx = self.context_mut(peer)?;
        let transport = ctx.transport.clone();

        transport.set_remote_description(offer).await?;
        ctx.remote = RemoteDescriptionState::Set;
        ctx.state = NegotiationState::OfferReceived;
        drain_pending(ctx).await;

        let answer = transport.create_answer().await?;
        transport.set_local_description(&answer).await?;
        ctx.local = LocalDescriptionState::AnswerSet;
        ctx.state = NegotiationState::AnswerSent;

        info!(channel = %ctx.key, "Answer applied locally");
        Ok(answer)
    }

    async fn run_apply_answer(
        &mut self,
        peer: &PeerId,
        answer: &SessionDescription,
    ) -> Result<(), NegotiationError> {
        let ctx = self.context_mut(peer)?;
        let transport = ctx.transport.clone();

        transport.set_remote_description(answer).await?;
        ctx.remote = RemoteDescriptionState::Set;
        ctx.state = NegotiationState::AnswerApplied;
        drain_pending(ctx).await;

        info!(channel = %ctx.key, "Answer applied");
        Ok(())
    }

    fn context_mut(&mut self, peer: &PeerId) -> Result<&mut NegotiationContext, NegotiationError> {
        self.contexts
            .get_mut(peer)
            .ok_or_else(|| NegotiationError::UnknownPeer(peer.clone()))
    }

    async fn close_context(&mut self, peer: &PeerId) -> bool {
        let Some(mut ctx) = self.contexts.remove(peer) else {
            return false;
        };

        if self.recently_closed.len() == RECENTLY_CLOSED {
            self.recently_closed.pop_front();
        }
        self.recently_closed.push_back(peer.clone());

        ctx.state = NegotiationState::Closed;
        let dropped = ctx.pending_candidates.len();
        ctx.pending_candidates.clear();
        if let Err(e) = ctx.transport.close().await {
            warn!(channel = %ctx.key, "Failed to close transport: {}", e);
        }
        info!(channel = %ctx.key, dropped, "Negotiation context closed");
        true
    }
}

/// Apply every buffered candidate in arrival order, exactly once.
async fn drain_pending(ctx: &mut NegotiationContext) {
    let count = ctx.pending_candidates.len();
    while let Some(candidate) = ctx.pending_candidates.pop_front() {
        if let Err(e) = ctx.transport.add_ice_candidate(&candidate).await {
            warn!(channel = %ctx.key, "Buffered candidate rejected: {}", e);
        }
    }
    if count > 0 {
        debug!(channel = %ctx.key, count, "Drained buffered candidates");
    }
}
