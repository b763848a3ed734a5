use airwave_client::{SignalingClient, SignalingError};
use airwave_core::PeerId;

use crate::integration::{fast_config, init_tracing};
use crate::utils::{TestRelay, closed_endpoint};

#[tokio::test]
async fn test_third_endpoint_connects_after_two_failures() {
    init_tracing();

    let relay = TestRelay::spawn().await.expect("Failed to spawn relay");
    let endpoints = vec![closed_endpoint().await, closed_endpoint().await, relay.url()];
    let (client, _events) = SignalingClient::new(fast_config(endpoints), PeerId::new());

    let url = client.connect("demo").await.expect("failover did not reach the relay");

    assert_eq!(url, relay.url());
    assert_eq!(client.current_endpoint(), Some(relay.url()));
    // Two failures plus the successful attempt, within the ceiling of 3.
    assert_eq!(client.connection_attempts(), 3);
    assert!(
        relay
            .wait_until(2000, |state| state.registry.member_count("demo") == 1)
            .await
    );
}

#[tokio::test]
async fn test_attempt_ceiling_stops_failover() {
    init_tracing();

    let relay = TestRelay::spawn().await.expect("Failed to spawn relay");
    let endpoints = vec![closed_endpoint().await, closed_endpoint().await, relay.url()];
    let mut config = fast_config(endpoints);
    config.max_attempts = 2;
    let (client, _events) = SignalingClient::new(config, PeerId::new());

    let err = client.connect("demo").await.expect_err("ceiling should stop before the relay");
    assert!(matches!(err, SignalingError::Exhausted { attempts: 2 }));
    assert!(!client.is_connected());
    assert_eq!(relay.state.relay.endpoint_count(), 0);
}

#[tokio::test]
async fn test_no_endpoints_is_an_error() {
    init_tracing();

    let (client, _events) = SignalingClient::new(fast_config(Vec::new()), PeerId::new());
    let err = client.connect("demo").await.expect_err("nothing to connect to");
    assert!(matches!(err, SignalingError::NoEndpoints));
}
