//! Streaming connection management
//!
//! Owns the single WebSocket connection to the proxy's streaming endpoint.
//! Inbound text frames are fed to the synchronization session by a reader
//! task; outbound commands go through a writer task and are fire-and-forget.
//! The connection is an explicitly owned resource: opening a new one closes
//! the previous one first, and closing is deterministic.

use crate::protocol::command::Command;
use crate::sync::session::SyncSession;
use anyhow::{anyhow, Context};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

/// Path of the streaming endpoint on the proxy
const STREAM_PATH: &str = "/requestsWS";

struct ConnectionHandle {
    outbound: mpsc::UnboundedSender<Message>,
    open: Arc<AtomicBool>,
}

impl ConnectionHandle {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }
}

/// Manages the lifetime of the streaming connection to one proxy.
pub struct ConnectionManager {
    session: Arc<SyncSession>,
    active: Mutex<Option<ConnectionHandle>>,
}

impl ConnectionManager {
    pub fn new(session: Arc<SyncSession>) -> Self {
        Self {
            session,
            active: Mutex::new(None),
        }
    }

    /// Open the streaming connection, replacing (and closing) any
    /// previously owned one.
    pub async fn connect(&self, base_url: &Url) -> anyhow::Result<()> {
        self.close();

        let url = stream_url(base_url)?;
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("connecting to {url}"))?;
        tracing::info!(%url, "streaming connection established");

        let (mut write, mut read) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let open = Arc::new(AtomicBool::new(true));

        // Writer: drains queued frames, then closes the sink when the
        // sender side is dropped or a close frame was forwarded.
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let was_close = matches!(message, Message::Close(_));
                if let Err(err) = write.send(message).await {
                    tracing::debug!(error = %err, "outbound stream write failed");
                    break;
                }
                if was_close {
                    break;
                }
            }
            let _ = write.close().await;
        });

        // Reader: the engine's single stream ingress. Each frame is handed
        // to the session and processed to completion before the next read.
        let session = Arc::clone(&self.session);
        let reader_open = Arc::clone(&open);
        tokio::spawn(async move {
            let reason = loop {
                match read.next().await {
                    Some(Ok(Message::Text(frame))) => session.handle_frame(&frame),
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map(|f| f.reason.to_string());
                    }
                    Some(Ok(_)) => {
                        // Binary, ping and pong frames are transport noise here.
                    }
                    Some(Err(err)) => break Some(err.to_string()),
                    None => break None,
                }
            };
            reader_open.store(false, Ordering::SeqCst);
            session.notify_connection_closed(reason);
        });

        let mut active = self.active.lock().expect("connection lock poisoned");
        *active = Some(ConnectionHandle { outbound, open });
        Ok(())
    }

    /// Close the owned connection, if any. Safe to call repeatedly.
    pub fn close(&self) {
        let handle = self.active.lock().expect("connection lock poisoned").take();
        if let Some(handle) = handle {
            handle.open.store(false, Ordering::SeqCst);
            let _ = handle.outbound.send(Message::Close(None));
            tracing::info!("streaming connection released");
        }
    }

    /// Whether a streaming connection is currently open.
    pub fn is_open(&self) -> bool {
        self.active
            .lock()
            .expect("connection lock poisoned")
            .as_ref()
            .map(ConnectionHandle::is_open)
            .unwrap_or(false)
    }

    /// Submit an outbound command, fire-and-forget: with no open connection
    /// the command is logged and dropped, and no local state changes. Any
    /// resulting transition arrives later as an ordinary inbound event.
    pub fn send_command(&self, command: Command) {
        let guard = self.active.lock().expect("connection lock poisoned");
        let Some(handle) = guard.as_ref().filter(|handle| handle.is_open()) else {
            tracing::error!(
                action = command.action(),
                "no open streaming connection, dropping outbound command"
            );
            return;
        };
        match command.encode() {
            Ok(frame) => {
                if handle.outbound.send(Message::Text(frame)).is_err() {
                    tracing::error!(
                        action = command.action(),
                        "streaming connection went away, dropping outbound command"
                    );
                }
            }
            Err(err) => {
                tracing::error!(action = command.action(), error = %err, "failed to encode outbound command");
            }
        }
    }
}

/// Derive the websocket endpoint from the proxy's base URL.
fn stream_url(base_url: &Url) -> anyhow::Result<Url> {
    let mut url = base_url
        .join(STREAM_PATH)
        .with_context(|| format!("building stream URL from {base_url}"))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => return Ok(url),
        other => return Err(anyhow!("unsupported scheme {other:?} for streaming endpoint")),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot switch {base_url} to websocket scheme"))?;
    Ok(url)
}
