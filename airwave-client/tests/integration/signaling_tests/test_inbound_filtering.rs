use airwave_client::{SignalingClient, SignalingEvent};
use airwave_core::PeerId;
use serde_json::json;

use crate::integration::{fast_config, init_tracing, recv_matching};
use crate::utils::StubRelay;

#[tokio::test]
async fn test_inbound_filtering() {
    init_tracing();

    let mut stub = StubRelay::spawn().await.expect("Failed to spawn stub");
    let (client, mut events) = SignalingClient::new(fast_config(vec![stub.url.clone()]), PeerId::from("me"));
    client.connect("demo").await.expect("connect failed");
    let mut conn = stub.next_connection(2000).await.expect("no connection");

    recv_matching(&mut events, 2000, |e| matches!(e, SignalingEvent::Connected { .. })).await;

    // Echo of our own message.
    conn.send_json(json!({"type": "hello", "sender": "me", "roomId": "demo"}))
        .await
        .unwrap();
    // Addressed to somebody else.
    conn.send_json(json!({
        "type": "offer",
        "offer": {"type": "offer", "sdp": "v=0"},
        "sender": "other",
        "target": "someone-else"
    }))
    .await
    .unwrap();
    // Garbage.
    conn.send_raw("{not json").await.unwrap();
    conn.send_json(json!({"type": "mystery", "sender": "other"}))
        .await
        .unwrap();
    // Addressed to us.
    conn.send_json(json!({
        "type": "offer",
        "offer": {"type": "offer", "sdp": "v=0"},
        "sender": "other",
        "target": "me"
    }))
    .await
    .unwrap();

    let next = recv_matching(&mut events, 2000, |_| true).await;
    match next {
        SignalingEvent::Offer { from, offer } => {
            assert_eq!(from, PeerId::from("other"));
            assert_eq!(offer.sdp, "v=0");
        }
        other => panic!("expected the targeted offer first, got {other:?}"),
    }
}

#[tokio::test]
async fn test_outbound_messages_are_stamped() {
    init_tracing();

    let mut stub = StubRelay::spawn().await.expect("Failed to spawn stub");
    let (client, _events) = SignalingClient::new(fast_config(vec![stub.url.clone()]), PeerId::from("me"));
    client.connect("demo").await.expect("connect failed");
    let mut conn = stub.next_connection(2000).await.expect("no connection");
    conn.recv_json(2000).await.expect("join");
    conn.recv_json(2000).await.expect("get_rooms");

    client.send(airwave_core::SignalMessage::hello());
    let hello = conn.recv_json(2000).await.expect("hello");
    assert_eq!(hello, json!({"type": "hello", "sender": "me", "roomId": "demo"}));

    client.leave();
    let leave = conn.recv_json(2000).await.expect("leave");
    assert_eq!(leave, json!({"type": "leave", "roomId": "demo", "id": "me"}));
}
