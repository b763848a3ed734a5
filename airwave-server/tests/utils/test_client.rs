use anyhow::{Context, Result, bail};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Timeout for a single expected relay message (ms).
pub const RECV_TIMEOUT_MS: u64 = 2000;

/// Raw WebSocket peer speaking the relay's JSON envelope protocol.
pub struct TestClient {
    pub id: String,
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

impl TestClient {
    pub async fn connect(url: &str, id: &str) -> Result<Self> {
        let (stream, _) = connect_async(url)
            .await
            .context("Failed to connect test client")?;
        let (write, read) = stream.split();
        Ok(Self {
            id: id.to_owned(),
            write,
            read,
        })
    }

    pub async fn send_json(&mut self, value: Value) -> Result<()> {
        self.write
            .send(Message::Text(value.to_string().into()))
            .await
            .context("Failed to send text frame")
    }

    pub async fn send_binary_json(&mut self, value: Value) -> Result<()> {
        self.write
            .send(Message::Binary(value.to_string().into_bytes().into()))
            .await
            .context("Failed to send binary frame")
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.write
            .send(Message::Text(text.to_owned().into()))
            .await
            .context("Failed to send raw frame")
    }

    /// Next JSON message, skipping control frames.
    pub async fn recv_json(&mut self, timeout_ms: u64) -> Result<Value> {
        let wait = Duration::from_millis(timeout_ms);
        loop {
            let frame = tokio::time::timeout(wait, self.read.next())
                .await
                .context("Timeout waiting for relay message")?;
            match frame {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).context("Relay sent invalid JSON");
                }
                Some(Ok(Message::Close(_))) | None => bail!("Relay closed the connection"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => bail!("WebSocket error: {e}"),
            }
        }
    }

    /// Next message whose `type` is `kind`, discarding others.
    pub async fn recv_kind(&mut self, kind: &str, timeout_ms: u64) -> Result<Value> {
        loop {
            let msg = self.recv_json(timeout_ms).await?;
            if msg["type"] == kind {
                return Ok(msg);
            }
            tracing::debug!("[TestClient] skipping {}", msg);
        }
    }

    /// Succeeds if nothing arrives within `window_ms`.
    pub async fn expect_silence(&mut self, window_ms: u64) -> Result<()> {
        match self.recv_json(window_ms).await {
            Ok(msg) => bail!("Expected silence, got {msg}"),
            Err(_) => Ok(()),
        }
    }

    pub async fn join(&mut self, room: &str) -> Result<u64> {
        let id = self.id.clone();
        self.send_json(json!({"type": "join", "roomId": room, "id": id}))
            .await?;
        let joined = self.recv_kind("joined", RECV_TIMEOUT_MS).await?;
        joined["peerCount"]
            .as_u64()
            .context("joined without peerCount")
    }

    pub async fn leave(&mut self, room: &str) -> Result<()> {
        let id = self.id.clone();
        self.send_json(json!({"type": "leave", "roomId": room, "id": id}))
            .await
    }

    pub async fn list_rooms(&mut self) -> Result<Vec<(String, u64)>> {
        self.send_json(json!({"type": "get_rooms"})).await?;
        let list = self.recv_kind("rooms_list", RECV_TIMEOUT_MS).await?;
        let rooms = list["rooms"]
            .as_array()
            .context("rooms_list without rooms")?
            .iter()
            .map(|r| {
                (
                    r["id"].as_str().unwrap_or_default().to_owned(),
                    r["count"].as_u64().unwrap_or_default(),
                )
            })
            .collect();
        Ok(rooms)
    }

    pub async fn close(mut self) -> Result<()> {
        self.write
            .send(Message::Close(None))
            .await
            .context("Failed to close test client")
    }
}
