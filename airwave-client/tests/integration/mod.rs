pub mod signaling_tests;

use airwave_client::{ClientConfig, SignalingConfig};
use tracing::Level;
use url::Url;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Short timeouts so failure paths finish quickly.
pub fn fast_config(endpoints: Vec<Url>) -> SignalingConfig {
    SignalingConfig {
        endpoints,
        connect_timeout_ms: 500,
        max_attempts: 3,
        reconnect_delay_ms: 100,
    }
}

pub fn session_config(endpoint: Url) -> ClientConfig {
    ClientConfig {
        signaling: fast_config(vec![endpoint]),
        ice_servers: Vec::new(),
    }
}

/// Wait for the first signaling event matching `pred`, skipping others.
pub async fn recv_matching<F>(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<airwave_client::SignalingEvent>,
    timeout_ms: u64,
    mut pred: F,
) -> airwave_client::SignalingEvent
where
    F: FnMut(&airwave_client::SignalingEvent) -> bool,
{
    let wait = std::time::Duration::from_millis(timeout_ms);
    loop {
        let event = tokio::time::timeout(wait, events.recv())
            .await
            .expect("Timeout waiting for signaling event")
            .expect("Signaling client stopped");
        if pred(&event) {
            return event;
        }
    }
}
