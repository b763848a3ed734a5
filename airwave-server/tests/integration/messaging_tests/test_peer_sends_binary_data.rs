use serde_json::json;

use crate::integration::init_tracing;
use crate::utils::{RECV_TIMEOUT_MS, TestClient, TestRelay};

#[tokio::test]
async fn test_peer_sends_binary_data() {
    init_tracing();

    let relay = TestRelay::spawn().await.expect("Failed to spawn relay");
    let mut a = TestClient::connect(&relay.ws_url(), "a").await.expect("connect a");
    let mut b = TestClient::connect(&relay.ws_url(), "b").await.expect("connect b");
    a.join("demo").await.expect("join a");
    b.join("demo").await.expect("join b");

    let ice = json!({
        "type": "ice",
        "ice": {"candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host", "sdpMid": "0", "sdpMLineIndex": 0},
        "sender": "a",
        "roomId": "demo"
    });
    a.send_binary_json(ice.clone()).await.expect("send binary");

    // UTF-8 binary frames are treated as text and re-sent as text.
    let forwarded = b.recv_kind("ice", RECV_TIMEOUT_MS).await.expect("b got nothing");
    assert_eq!(forwarded, ice);
}
