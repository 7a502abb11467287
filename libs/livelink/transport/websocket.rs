//! JSON-over-WebSocket push transport
//!
//! One channel per WebSocket connection. `open_channel` dials the gateway,
//! sends a subscribe frame for the filter key and waits for the server's
//! acknowledgement before handing the channel back; after that a reader task
//! pumps notification frames into the event feed and tracks channel health.
//!
//! Frame protocol (text frames, JSON):
//! - client -> server: `{"event": "subscribe", "topic": "<filter key>"}`
//! - server -> client: `{"event": "subscribed", "topic": "..."}`
//! - server -> client: `{"event": "notification", "payload": {...}}`
//! - server -> client: `{"event": "error", "reason": "..."}`

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, warn};

use crate::channel::{
    AtomicChannelState, ChannelEvent, ChannelHandle, ChannelState, PushTransport,
};
use crate::error::{LinkError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// WebSocket implementation of [`PushTransport`]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    /// Create a transport that dials `url` (ws:// or wss://) per channel
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl PushTransport for WebSocketTransport {
    type Payload = Value;
    type Handle = WebSocketChannel;

    async fn open_channel(
        &self,
        filter_key: &str,
    ) -> Result<(WebSocketChannel, UnboundedReceiver<ChannelEvent<Value>>)> {
        let (ws, _) = connect_async(&self.url).await.map_err(|e| {
            LinkError::Transport(format!("failed to connect to {}: {}", self.url, e))
        })?;
        let (mut write, mut read) = ws.split();

        let subscribe = json!({ "event": "subscribe", "topic": filter_key });
        write
            .send(Message::Text(subscribe.to_string()))
            .await
            .map_err(|e| LinkError::Transport(format!("failed to send subscribe frame: {}", e)))?;
        debug!("subscribe frame sent for topic '{}'", filter_key);

        // Wait for the acknowledgement before reporting the channel joined.
        // The caller bounds this whole sequence with its join timeout.
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: Value = serde_json::from_str(&text).map_err(|e| {
                        LinkError::Transport(format!("undecodable frame during join: {}", e))
                    })?;
                    match frame.get("event").and_then(Value::as_str) {
                        Some("subscribed") => break,
                        Some("error") => {
                            return Err(LinkError::Transport(format!(
                                "server rejected subscription: {}",
                                frame
                            )));
                        }
                        _ => debug!("ignoring frame before subscribe ack"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(LinkError::ChannelClosed(
                        "server closed during join".to_string(),
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Err(LinkError::Transport(format!(
                        "websocket error during join: {}",
                        e
                    )));
                }
            }
        }

        let state = Arc::new(AtomicChannelState::new(ChannelState::Joined));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let reader = spawn_reader(read, Arc::clone(&state), event_tx);

        let channel = WebSocketChannel {
            state,
            writer: tokio::sync::Mutex::new(Some(write)),
            reader: parking_lot::Mutex::new(Some(reader)),
        };
        Ok((channel, event_rx))
    }
}

/// Reader task: forwards notification frames and reports channel death
fn spawn_reader(
    mut read: SplitStream<WsStream>,
    state: Arc<AtomicChannelState>,
    events: UnboundedSender<ChannelEvent<Value>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => match serde_json::from_str::<Value>(&text) {
                    Ok(frame) => match frame.get("event").and_then(Value::as_str) {
                        Some("notification") => {
                            let payload = frame.get("payload").cloned().unwrap_or(Value::Null);
                            if events.send(ChannelEvent::Message(payload)).is_err() {
                                // receiver dropped; nobody is listening anymore
                                return;
                            }
                        }
                        Some("error") => {
                            state.set(ChannelState::Errored);
                            let _ =
                                events.send(ChannelEvent::Error(format!("server error: {}", frame)));
                            return;
                        }
                        _ => debug!("ignoring frame: {}", frame),
                    },
                    Err(e) => warn!("undecodable frame: {}", e),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    error!("websocket read error: {}", e);
                    state.set(ChannelState::Errored);
                    let _ = events.send(ChannelEvent::Error(e.to_string()));
                    return;
                }
            }
        }
        // Stream ended without an explicit error; if the close was not ours,
        // report it so the manager can react.
        if state.get() == ChannelState::Joined {
            state.set(ChannelState::Closed);
            let _ = events.send(ChannelEvent::Closed);
        }
    })
}

/// Handle to one live notification channel over a WebSocket
pub struct WebSocketChannel {
    state: Arc<AtomicChannelState>,
    writer: tokio::sync::Mutex<Option<WsSink>>,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl ChannelHandle for WebSocketChannel {
    fn state(&self) -> ChannelState {
        self.state.get()
    }

    async fn close(&self) {
        // Mark closed first so the reader treats the stream end as deliberate
        self.state.set(ChannelState::Closed);
        if let Some(mut write) = self.writer.lock().await.take() {
            let _ = write.send(Message::Close(None)).await;
            let _ = write.close().await;
        }
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}
