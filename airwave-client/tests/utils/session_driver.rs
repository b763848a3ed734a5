use airwave_client::{CallSession, SessionEvent};
use anyhow::{Context, Result};
use std::time::Duration;

/// Drive `session` until an event matches `pred`, returning that event.
pub async fn drive_until<F>(session: &mut CallSession, timeout_ms: u64, mut pred: F) -> Result<SessionEvent>
where
    F: FnMut(&SessionEvent) -> bool,
{
    tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        next_matching(session, &mut pred),
    )
    .await
    .context("Timeout driving session")?
}

async fn next_matching<F>(session: &mut CallSession, pred: &mut F) -> Result<SessionEvent>
where
    F: FnMut(&SessionEvent) -> bool,
{
    loop {
        let event = session.next_event().await.context("Session stopped")?;
        tracing::debug!("[{}] {:?}", session.peer_id(), event);
        if pred(&event) {
            return Ok(event);
        }
    }
}

/// Drive `session` for `window_ms`, collecting whatever it reports.
pub async fn drive_for(session: &mut CallSession, window_ms: u64) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    let _ = tokio::time::timeout(Duration::from_millis(window_ms), async {
        while let Some(event) = session.next_event().await {
            events.push(event);
        }
    })
    .await;
    events
}
