use crate::integration::init_tracing;
use crate::utils::{RECV_TIMEOUT_MS, TestClient, TestRelay};

#[tokio::test]
async fn test_single_peer_joins_room() {
    init_tracing();

    let relay = TestRelay::spawn().await.expect("Failed to spawn relay");
    let mut client = TestClient::connect(&relay.ws_url(), "solo")
        .await
        .expect("Failed to connect");

    client
        .send_json(serde_json::json!({"type": "join", "roomId": "demo", "id": "solo"}))
        .await
        .expect("Failed to send join");

    let joined = client
        .recv_kind("joined", RECV_TIMEOUT_MS)
        .await
        .expect("No joined reply");
    assert_eq!(joined["peerCount"], 1);
    assert_eq!(joined["sender"], "server");

    assert_eq!(relay.state.registry.member_count("demo"), 1);

    client.close().await.expect("Failed to close client");
}
