//! Hub event stream over WebSocket.
//!
//! Connects to the hub's `/async` endpoint, parses unit-change frames and
//! fans them out to registered [`UnitStatusListener`]s. The socket runs
//! on its own tokio task; [`EventStream::connect`] returns as soon as that
//! task is spawned.
//!
//! Reconnection is a caller decision: [`ReconnectConfig`] defaults to a
//! single connection per [`connect`](EventStream::connect) call. Enable it
//! to get exponential backoff with jitter between attempts.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use touchwand_api::websocket::{EventStream, StreamConfig};
//!
//! let stream = EventStream::new(StreamConfig::new(ws_url));
//! stream.register_listener(Arc::new(my_listener));
//! stream.connect().await;
//! // ...
//! stream.dispose().await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::models::UnitRecord;

const SUB_PROTOCOL: &str = "relay_protocol";
const UNIT_CHANGED: &str = "UNIT_CHANGED";
const KEEPALIVE_MESSAGE: &str = r#"{"myopenhab": "echo"}"#;

// ── Listener capability ──────────────────────────────────────────────

/// Recipient of parsed unit-status events.
///
/// Called on the stream's I/O task; implementations must not block.
pub trait UnitStatusListener: Send + Sync {
    fn on_unit_status(&self, unit: &UnitRecord);
}

/// Handle returned by [`EventStream::register_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// ── StreamState ──────────────────────────────────────────────────────

/// Socket lifecycle, observable through [`EventStream::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

// ── Configuration ────────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Off by default: one connection per `connect()` call.
    pub enabled: bool,

    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

impl ReconnectConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }
}

/// Everything the socket task needs.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: Url,
    pub reconnect: ReconnectConfig,
    /// Interval between keep-alive frames. Default: 10 minutes.
    pub keepalive_interval: Duration,
}

impl StreamConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            reconnect: ReconnectConfig::default(),
            keepalive_interval: Duration::from_secs(600),
        }
    }
}

// ── EventStream ──────────────────────────────────────────────────────

/// Long-lived event connection to one hub.
///
/// Dropping the stream cancels the socket task and clears the listeners;
/// [`dispose`](Self::dispose) does the same and also waits for the task.
pub struct EventStream {
    config: StreamConfig,
    shared: Arc<StreamShared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct StreamShared {
    listeners: DashMap<ListenerId, Arc<dyn UnitStatusListener>>,
    next_listener: AtomicU64,
    state: watch::Sender<StreamState>,
}

impl EventStream {
    pub fn new(config: StreamConfig) -> Self {
        let (state, _) = watch::channel(StreamState::Disconnected);
        Self {
            config,
            shared: Arc::new(StreamShared {
                listeners: DashMap::new(),
                next_listener: AtomicU64::new(0),
                state,
            }),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Spawn the socket task. No-op if it is already running or the
    /// stream has been disposed.
    pub async fn connect(&self) {
        if self.cancel.is_cancelled() {
            tracing::debug!("connect called on disposed event stream");
            return;
        }

        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let config = self.config.clone();
        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        *task = Some(tokio::spawn(async move {
            ws_loop(config, shared, cancel).await;
        }));
    }

    pub fn register_listener(&self, listener: Arc<dyn UnitStatusListener>) -> ListenerId {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared.listeners.insert(id, listener);
        tracing::debug!(?id, "event stream listener registered");
        id
    }

    /// Returns `false` if the id was not registered.
    pub fn unregister_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(&id).is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len()
    }

    /// Subscribe to socket state changes.
    pub fn state(&self) -> watch::Receiver<StreamState> {
        self.shared.state.subscribe()
    }

    pub fn current_state(&self) -> StreamState {
        *self.shared.state.borrow()
    }

    /// Close the socket, wait for the task to end and drop all listeners.
    ///
    /// Once this returns no listener will be called again. Idempotent.
    pub async fn dispose(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "event stream task ended abnormally");
            }
        }
        self.shared.listeners.clear();
        self.shared.state.send_replace(StreamState::Disconnected);
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.shared.listeners.clear();
    }
}

impl StreamShared {
    fn set_state(&self, state: StreamState) {
        self.state.send_replace(state);
    }

    fn dispatch(&self, unit: &UnitRecord) {
        // Snapshot first so a listener may unregister itself from its callback.
        let targets: Vec<Arc<dyn UnitStatusListener>> = self
            .listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for listener in targets {
            listener.on_unit_status(unit);
        }
    }
}

// ── Background loop ──────────────────────────────────────────────────

/// connect → read → (optionally) backoff → reconnect.
async fn ws_loop(config: StreamConfig, shared: Arc<StreamShared>, cancel: CancellationToken) {
    let mut attempt: u32 = 0;

    loop {
        shared.set_state(StreamState::Connecting);
        let result = connect_and_read(&config, &shared, &cancel).await;

        if cancel.is_cancelled() {
            break;
        }
        shared.set_state(StreamState::Disconnected);

        match result {
            Ok(()) => {
                tracing::info!("event stream disconnected");
                attempt = 0;
                if !config.reconnect.enabled {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "event stream error");
                if !config.reconnect.enabled {
                    break;
                }

                if let Some(max) = config.reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "event stream reconnection limit reached, giving up"
                        );
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &config.reconnect);
                tracing::info!(?delay, attempt, "waiting before reconnect");

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt += 1;
            }
        }
    }

    shared.set_state(StreamState::Disconnected);
    tracing::debug!("event stream loop exiting");
}

/// One connection: handshake, then read frames until it drops or is cancelled.
async fn connect_and_read(
    config: &StreamConfig,
    shared: &StreamShared,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %config.url, "connecting to hub event stream");

    let uri: tungstenite::http::Uri = config
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;
    let request = ClientRequestBuilder::new(uri).with_sub_protocol(SUB_PROTOCOL);

    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        res = tokio_tungstenite::connect_async(request) => {
            res.map_err(|e| Error::WebSocketConnect(e.to_string()))?
        }
    };

    shared.set_state(StreamState::Connected);
    tracing::info!("hub event stream connected");

    let (mut write, mut read) = ws_stream.split();
    let mut keepalive = tokio::time::interval(config.keepalive_interval);
    keepalive.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                shared.set_state(StreamState::Closing);
                if let Err(e) = write.send(tungstenite::Message::Close(None)).await {
                    tracing::debug!(error = %e, "close frame not sent");
                }
                return Ok(());
            }
            _ = keepalive.tick() => {
                write
                    .send(tungstenite::Message::Text(KEEPALIVE_MESSAGE.into()))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                tracing::trace!("keep-alive sent");
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        handle_frame(text.as_str(), shared);
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        return match frame {
                            Some(cf) if cf.code != tungstenite::protocol::frame::coding::CloseCode::Normal => {
                                Err(Error::WebSocketClosed {
                                    code: cf.code.into(),
                                    reason: cf.reason.as_str().to_owned(),
                                })
                            }
                            _ => Ok(()),
                        };
                    }
                    Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                    None => {
                        tracing::info!("hub event stream ended");
                        return Ok(());
                    }
                    // Binary, ping/pong (answered by tungstenite), raw frames
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

// ── Frame parsing ────────────────────────────────────────────────────

/// Parse one text frame into a unit update.
///
/// The hub wraps updates as `{"type": "UNIT_CHANGED", "unit": {..}}`; a bare
/// unit object is accepted as well. Other envelope types yield `Ok(None)`.
fn parse_frame(text: &str) -> Result<Option<UnitRecord>, Error> {
    let value: Value = serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: text.to_owned(),
    })?;

    match value.get("unit") {
        Some(unit) => {
            if value.get("type").and_then(Value::as_str) == Some(UNIT_CHANGED) {
                UnitRecord::from_json(unit).map(Some)
            } else {
                Ok(None)
            }
        }
        None => UnitRecord::from_json(&value).map(Some),
    }
}

fn handle_frame(text: &str, shared: &StreamShared) {
    match parse_frame(text) {
        Ok(Some(unit)) => {
            tracing::debug!(unit = %unit.id, "unit status event");
            shared.dispatch(&unit);
        }
        Ok(None) => tracing::trace!("ignoring non-unit frame"),
        Err(e) => tracing::debug!(error = %e, "dropping malformed frame"),
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`, jitter within +-25%.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
