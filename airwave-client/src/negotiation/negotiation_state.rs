#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    OfferPending,
    OfferSent,
    AnswerApplied,
    OfferReceived,
    AnswerSent,
    Established,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    Undecided,
    Offerer,
    Answerer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalDescriptionState {
    None,
    OfferCreated,
    OfferSet,
    AnswerSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDescriptionState {
    None,
    Set,
}

/// Whether an incoming candidate went to the transport, into a buffer, or
/// was dropped as a leftover of a channel that no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateDisposition {
    Applied,
    Buffered,
    Discarded,
}
