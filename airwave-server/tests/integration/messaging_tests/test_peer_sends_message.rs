use serde_json::json;

use crate::integration::init_tracing;
use crate::utils::{RECV_TIMEOUT_MS, TestClient, TestRelay};

#[tokio::test]
async fn test_peer_sends_message() {
    init_tracing();

    let relay = TestRelay::spawn().await.expect("Failed to spawn relay");
    let mut a = TestClient::connect(&relay.ws_url(), "a").await.expect("connect a");
    let mut b = TestClient::connect(&relay.ws_url(), "b").await.expect("connect b");
    let mut outsider = TestClient::connect(&relay.ws_url(), "c")
        .await
        .expect("connect c");

    a.join("demo").await.expect("join a");
    b.join("demo").await.expect("join b");
    outsider.join("elsewhere").await.expect("join c");

    let offer = json!({
        "type": "offer",
        "offer": {"type": "offer", "sdp": "v=0"},
        "sender": "a",
        "roomId": "demo"
    });
    a.send_json(offer.clone()).await.expect("send offer");

    // Forwarded unchanged to the other member only.
    let forwarded = b.recv_kind("offer", RECV_TIMEOUT_MS).await.expect("b got nothing");
    assert_eq!(forwarded, offer);

    a.expect_silence(200).await.expect("sender must not get its own message");
    outsider
        .expect_silence(200)
        .await
        .expect("other rooms must not see the message");
}

#[tokio::test]
async fn test_forward_stamps_missing_sender() {
    init_tracing();

    let relay = TestRelay::spawn().await.expect("Failed to spawn relay");
    let mut a = TestClient::connect(&relay.ws_url(), "a").await.expect("connect a");
    let mut b = TestClient::connect(&relay.ws_url(), "b").await.expect("connect b");
    a.join("demo").await.expect("join a");
    b.join("demo").await.expect("join b");

    a.send_json(json!({"type": "hello"})).await.expect("send hello");

    let hello = b.recv_kind("hello", RECV_TIMEOUT_MS).await.expect("b got nothing");
    assert!(hello["sender"].as_str().is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn test_roomless_peer_message_is_dropped() {
    init_tracing();

    let relay = TestRelay::spawn().await.expect("Failed to spawn relay");
    let mut member = TestClient::connect(&relay.ws_url(), "member")
        .await
        .expect("connect member");
    let mut stranger = TestClient::connect(&relay.ws_url(), "stranger")
        .await
        .expect("connect stranger");
    member.join("demo").await.expect("join member");

    stranger
        .send_json(json!({"type": "hello", "sender": "stranger"}))
        .await
        .expect("send hello");

    member.expect_silence(200).await.expect("roomless sends go nowhere");
}
