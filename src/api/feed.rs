//! Live metrics feed over a web socket.
//!
//! The processing loop publishes every snapshot into a
//! `tokio::sync::broadcast` channel; each web socket client holds its own
//! receiver. A client that falls behind skips the frames it missed and
//! continues with the newest.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use super::DashboardState;
use crate::types::Metrics;

#[derive(Debug, Clone)]
pub struct MetricsFeed {
    sender: broadcast::Sender<Metrics>,
}

impl MetricsFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Send a snapshot to every subscriber. Returns how many received it.
    pub fn publish(&self, metrics: Metrics) -> usize {
        // An error only means nobody is listening
        self.sender.send(metrics).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Metrics> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// JSON text frame for one snapshot.
pub fn frame_text(metrics: &Metrics) -> Option<String> {
    match serde_json::to_string(metrics) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Failed to serialize metrics frame: {}", e);
            None
        }
    }
}

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<DashboardState>) -> Response {
    ws.on_upgrade(move |socket| stream_metrics(socket, state))
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    metrics: &Metrics,
) -> Result<(), axum::Error> {
    match frame_text(metrics) {
        Some(text) => sink.send(Message::Text(text)).await,
        None => Ok(()),
    }
}

async fn stream_metrics(socket: WebSocket, state: DashboardState) {
    let (mut sink, mut incoming) = socket.split();
    let mut frames = state.feed.subscribe();
    debug!(subscribers = state.feed.subscriber_count(), "Web socket client connected");

    let initial = state.app_state.read().await.latest_metrics.clone();
    if send_frame(&mut sink, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(metrics) => {
                    if send_frame(&mut sink, &metrics).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Web socket client lagging, skipping frames");
                }
                Err(RecvError::Closed) => break,
            },
            message = incoming.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("Web socket client disconnected");
}
