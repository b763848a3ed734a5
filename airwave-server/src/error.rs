use crate::room::EndpointId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("endpoint {0} is not registered")]
    UnknownEndpoint(EndpointId),

    #[error("delivery channel for endpoint {0} is closed")]
    ChannelClosed(EndpointId),

    #[error("failed to serialize relay message: {0}")]
    Serialize(#[from] serde_json::Error),
}
