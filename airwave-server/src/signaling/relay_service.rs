use crate::error::RelayError;
use crate::room::EndpointId;
use crate::signaling::RelayOutput;
use airwave_core::SignalMessage;
use axum::extract::ws::Message;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

struct RelayInner {
    endpoints: DashMap<EndpointId, mpsc::UnboundedSender<Message>>,
}

/// Registry of live relay sockets, keyed by endpoint.
///
/// Each socket task registers an unbounded sender here; everything that wants
/// to write to that socket goes through this service.
#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl RelayService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RelayInner {
                endpoints: DashMap::new(),
            }),
        }
    }

    pub fn add_endpoint(&self, endpoint: EndpointId, tx: mpsc::UnboundedSender<Message>) {
        self.inner.endpoints.insert(endpoint, tx);
    }

    pub fn remove_endpoint(&self, endpoint: &EndpointId) {
        self.inner.endpoints.remove(endpoint);
    }

    pub fn endpoint_count(&self) -> usize {
        self.inner.endpoints.len()
    }

    /// Serialize and queue a relay-originated message for one endpoint.
    pub fn send_signal(&self, endpoint: &EndpointId, msg: &SignalMessage) {
        if let Err(e) = self.try_send_signal(endpoint, msg) {
            warn!(kind = msg.kind(), "Failed to send relay reply: {}", e);
        }
    }

    fn try_send_signal(&self, endpoint: &EndpointId, msg: &SignalMessage) -> Result<(), RelayError> {
        let json = serde_json::to_string(msg)?;
        self.deliver(endpoint, &json)
    }
}

impl Default for RelayService {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayOutput for RelayService {
    fn deliver(&self, endpoint: &EndpointId, payload: &str) -> Result<(), RelayError> {
        let Some(tx) = self.inner.endpoints.get(endpoint) else {
            return Err(RelayError::UnknownEndpoint(endpoint.clone()));
        };
        tx.send(Message::Text(payload.into()))
            .map_err(|_| RelayError::ChannelClosed(endpoint.clone()))
    }
}
