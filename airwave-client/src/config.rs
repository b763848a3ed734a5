use airwave_core::IceServerConfig;
use airwave_core::utils::DEFAULT_STUN_ADDR;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Relay the client falls back to when no endpoints are configured.
pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:3000/";

/// Relay endpoint list and retry policy for the signaling client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// Primary endpoint first, fallbacks after, tried in order.
    pub endpoints: Vec<Url>,
    pub connect_timeout_ms: u64,
    pub max_attempts: u32,
    pub reconnect_delay_ms: u64,
}

impl SignalingConfig {
    pub fn new(endpoints: Vec<Url>) -> Self {
        Self {
            endpoints,
            ..Default::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            endpoints: Url::parse(DEFAULT_RELAY_URL).into_iter().collect(),
            connect_timeout_ms: 5000,
            max_attempts: 3,
            reconnect_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub signaling: SignalingConfig,
    pub ice_servers: Vec<IceServerConfig>,
}

impl ClientConfig {
    pub fn with_endpoints(endpoints: Vec<Url>) -> Self {
        Self {
            signaling: SignalingConfig::new(endpoints),
            ..Default::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signaling: SignalingConfig::default(),
            ice_servers: vec![IceServerConfig::stun(DEFAULT_STUN_ADDR)],
        }
    }
}
