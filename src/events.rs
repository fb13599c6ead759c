//! The push side of the client: an auto-reconnecting WebSocket
//! subscription delivering job and metric deltas.
//!
//! The channel never replays missed deltas after a reconnect gap, so a
//! fresh [`ChannelStatus::Connected`] is the consumer's cue to re-pull
//! full snapshots (see `Client::handle_event`).

use futures_util::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::models::{JobDelta, SystemMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Status(ChannelStatus),
    Job(JobDelta),
    Metrics(SystemMetrics),
}

// Wire frames as the service emits them: {"event": ..., "data": ...}.
// The `connected` handshake ack is tolerated and dropped.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum WireFrame {
    TaskUpdate(JobDelta),
    SystemUpdate(SystemMetrics),
    Connected(serde_json::Value),
}

fn decode_frame(text: &str) -> Option<ChannelEvent> {
    match serde_json::from_str::<WireFrame>(text) {
        Ok(WireFrame::TaskUpdate(delta)) => Some(ChannelEvent::Job(delta)),
        Ok(WireFrame::SystemUpdate(delta)) => Some(ChannelEvent::Metrics(delta)),
        Ok(WireFrame::Connected(_)) => None,
        Err(err) => {
            tracing::debug!("Ignoring unrecognized event frame: {err}");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventChannel {
    url: String,
    reconnect_delay: Duration,
}

impl EventChannel {
    pub fn new(url: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
        }
    }

    /// Start listening. The returned subscription owns the background
    /// task; dropping it (or calling [`Subscription::unsubscribe`])
    /// stops the channel.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(64);
        let handle = tokio::spawn(run_channel(
            self.url.clone(),
            self.reconnect_delay,
            tx,
        ));
        Subscription { events: rx, handle }
    }
}

#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<ChannelEvent>,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Stop listening. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run_channel(url: String, reconnect_delay: Duration, tx: mpsc::Sender<ChannelEvent>) {
    loop {
        if tx
            .send(ChannelEvent::Status(ChannelStatus::Connecting))
            .await
            .is_err()
        {
            return;
        }

        match connect_async(url.as_str()).await {
            Ok((mut ws, _)) => {
                tracing::info!("Event channel connected to {url}");
                if tx
                    .send(ChannelEvent::Status(ChannelStatus::Connected))
                    .await
                    .is_err()
                {
                    return;
                }

                loop {
                    match ws.next().await {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(event) = decode_frame(&text) {
                                if tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!("Event channel closed by the service");
                            break;
                        }
                        // Ping/pong and binary frames carry nothing for us
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            tracing::warn!("Event channel read error: {err}");
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                tracing::warn!("Event channel connect to {url} failed: {err}");
            }
        }

        if tx
            .send(ChannelEvent::Status(ChannelStatus::Disconnected))
            .await
            .is_err()
        {
            return;
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}
