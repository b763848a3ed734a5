use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{WebSocketStream, accept_async};
use url::Url;

/// Scriptable WebSocket server standing in for the relay.
pub struct StubRelay {
    pub url: Url,
    connections: mpsc::UnboundedReceiver<StubConnection>,
    handle: JoinHandle<()>,
}

pub struct StubConnection {
    ws: WebSocketStream<TcpStream>,
}

impl StubRelay {
    pub async fn spawn() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = Url::parse(&format!("ws://{}/", listener.local_addr()?))?;
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = accept_async(stream).await {
                    let _ = tx.send(StubConnection { ws });
                }
            }
        });

        Ok(Self {
            url,
            connections: rx,
            handle,
        })
    }

    pub async fn next_connection(&mut self, timeout_ms: u64) -> Result<StubConnection> {
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.connections.recv())
            .await
            .context("Timeout waiting for a client connection")?
            .context("Stub relay stopped")
    }

    pub async fn expect_no_connection(&mut self, window_ms: u64) -> Result<()> {
        match self.next_connection(window_ms).await {
            Ok(_) => bail!("Unexpected client connection"),
            Err(_) => Ok(()),
        }
    }
}

impl Drop for StubRelay {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl StubConnection {
    pub async fn recv_json(&mut self, timeout_ms: u64) -> Result<Value> {
        let wait = Duration::from_millis(timeout_ms);
        loop {
            let frame = tokio::time::timeout(wait, self.ws.next())
                .await
                .context("Timeout waiting for client message")?;
            match frame {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(text.as_str())?),
                Some(Ok(Message::Close(_))) | None => bail!("Client closed the connection"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => bail!("WebSocket error: {e}"),
            }
        }
    }

    pub async fn send_json(&mut self, value: Value) -> Result<()> {
        self.ws.send(Message::Text(value.to_string().into())).await?;
        Ok(())
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.ws.send(Message::Text(text.to_owned().into())).await?;
        Ok(())
    }

    /// Close with `code`, then wait for the client's side of the handshake.
    pub async fn close(mut self, code: CloseCode) -> Result<()> {
        self.ws
            .close(Some(CloseFrame {
                code,
                reason: Utf8Bytes::from_static("stub closing"),
            }))
            .await?;
        while let Some(Ok(_)) = self.ws.next().await {}
        Ok(())
    }

    /// Drop the TCP connection without a close frame.
    pub fn drop_abruptly(self) {
        drop(self.ws);
    }
}
