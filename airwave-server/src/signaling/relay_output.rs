use crate::error::RelayError;
use crate::room::EndpointId;

/// Delivery side of the relay, implemented by whatever owns the live sockets.
///
/// Must not block: the registry calls it while fanning a payload out to a room.
pub trait RelayOutput: Send + Sync {
    /// Queue a text payload for one endpoint.
    fn deliver(&self, endpoint: &EndpointId, payload: &str) -> Result<(), RelayError>;
}
