//! Reconnecting stream consumer.
//!
//! # State machine
//! ```text
//! Disconnected ──connect()──▶ Connecting ──open ok──▶ Connected
//!                                 │                      │
//!                             open failed        transport error / end
//!                                 ▼                      ▼
//!                               Error ◀──────────────────┘
//!                                 │
//!                         reconnect_delay elapsed
//!                                 ▼
//!                             Connecting
//!
//! disconnect() from any state ──▶ Disconnected (pending reconnect cancelled)
//! ```
//!
//! A single driver task owns the connection and the reconnect timer.
//! `disconnect()` bumps the generation and aborts that task; every state or
//! window write from a driver is checked against its generation under the
//! same lock, so a driver that outlives its abort can change nothing.

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

use crate::connector::{Connector, SseConnector};
use crate::error::StreamError;
use crate::window::SlidingWindow;
use crate::{TELEMETRY_WINDOW, TRACE_WINDOW};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Window size; older items are evicted first.
    pub max_items: usize,
    /// Delay before the single reconnect attempt after a failure.
    pub reconnect_delay: Duration,
    /// When false, `connect()` does nothing.
    pub enabled: bool,
}

impl StreamOptions {
    pub fn telemetry() -> Self {
        Self {
            max_items: TELEMETRY_WINDOW,
            ..Self::default()
        }
    }

    pub fn traces() -> Self {
        Self {
            max_items: TRACE_WINDOW,
            ..Self::default()
        }
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            max_items: TELEMETRY_WINDOW,
            reconnect_delay: Duration::from_secs(3),
            enabled: true,
        }
    }
}

struct Guarded<T> {
    generation: u64,
    window: SlidingWindow<T>,
}

struct Shared<T> {
    guarded: Mutex<Guarded<T>>,
    state: watch::Sender<ConnectionState>,
    received: watch::Sender<u64>,
}

impl<T> Shared<T> {
    fn set_state(&self, generation: u64, state: ConnectionState) -> bool {
        let guarded = self.guarded.lock();
        if guarded.generation != generation {
            return false;
        }
        self.state.send_replace(state);
        true
    }

    fn push(&self, generation: u64, item: T) -> bool {
        let mut guarded = self.guarded.lock();
        if guarded.generation != generation {
            return false;
        }
        guarded.window.push(item);
        self.received.send_modify(|n| *n += 1);
        true
    }
}

/// Consumer of one live stream with a bounded window of recent items.
pub struct StreamClient<T> {
    shared: Arc<Shared<T>>,
    connector: Arc<dyn Connector>,
    url: Mutex<Url>,
    driver: Mutex<Option<JoinHandle<()>>>,
    options: StreamOptions,
}

impl<T> StreamClient<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Client for `path` on the service at `base_url`, over SSE.
    pub fn new(base_url: &str, path: &str, options: StreamOptions) -> Result<Self, StreamError> {
        let url = Url::parse(base_url)?.join(path)?;
        Ok(Self::with_connector(url, options, Arc::new(SseConnector::default())))
    }

    pub fn with_connector(url: Url, options: StreamOptions, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (received, _) = watch::channel(0);

        Self {
            shared: Arc::new(Shared {
                guarded: Mutex::new(Guarded {
                    generation: 0,
                    window: SlidingWindow::new(options.max_items),
                }),
                state,
                received,
            }),
            connector,
            url: Mutex::new(url),
            driver: Mutex::new(None),
            options,
        }
    }

    /// Start the driver. No-op when disabled or already running.
    pub fn connect(&self) {
        if !self.options.enabled {
            tracing::debug!("Stream client disabled, not connecting");
            return;
        }

        let mut driver = self.driver.lock();
        if driver.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let generation = {
            let mut guarded = self.shared.guarded.lock();
            guarded.generation += 1;
            self.shared.state.send_replace(ConnectionState::Connecting);
            guarded.generation
        };

        let url = self.url.lock().clone();
        *driver = Some(tokio::spawn(drive(
            self.shared.clone(),
            self.connector.clone(),
            url,
            generation,
            self.options.reconnect_delay,
        )));
    }

    /// Close the connection and cancel any pending reconnect. Idempotent.
    pub fn disconnect(&self) {
        {
            let mut guarded = self.shared.guarded.lock();
            guarded.generation += 1;
            self.shared.state.send_replace(ConnectionState::Disconnected);
        }
        if let Some(handle) = self.driver.lock().take() {
            handle.abort();
        }
    }

    /// Disconnect, clear the window and connect again.
    pub fn reconnect(&self) {
        self.disconnect();
        self.clear();
        self.connect();
    }

    /// Replace the query string (e.g. `chaos=cpu,memory`). The window is
    /// cleared and the connection re-established with the new parameters.
    pub fn set_query(&self, query: Option<&str>) {
        self.url.lock().set_query(query.filter(|q| !q.is_empty()));
        self.reconnect();
    }

    pub fn url(&self) -> Url {
        self.url.lock().clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Total items received since creation; changes on every accepted item.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.shared.received.subscribe()
    }

    pub fn len(&self) -> usize {
        self.shared.guarded.lock().window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.shared.guarded.lock().window.clear();
    }
}

impl<T: Clone> StreamClient<T> {
    /// Window contents, oldest first.
    pub fn items(&self) -> Vec<T> {
        self.shared.guarded.lock().window.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<T> {
        self.shared.guarded.lock().window.latest().cloned()
    }
}

impl<T> Drop for StreamClient<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.driver.get_mut().take() {
            handle.abort();
        }
    }
}

async fn drive<T>(
    shared: Arc<Shared<T>>,
    connector: Arc<dyn Connector>,
    url: Url,
    generation: u64,
    reconnect_delay: Duration,
) where
    T: DeserializeOwned,
{
    loop {
        if !shared.set_state(generation, ConnectionState::Connecting) {
            return;
        }

        match connector.open(&url).await {
            Ok(mut messages) => {
                if !shared.set_state(generation, ConnectionState::Connected) {
                    return;
                }
                tracing::debug!(url = %url, "Stream connected");

                loop {
                    match messages.next().await {
                        Some(Ok(data)) => match serde_json::from_str::<T>(&data) {
                            Ok(item) => {
                                if !shared.push(generation, item) {
                                    return;
                                }
                            }
                            Err(e) => tracing::warn!(error = %e, "Dropping malformed stream message"),
                        },
                        Some(Err(e)) => {
                            tracing::warn!(url = %url, error = %e, "Stream transport error");
                            break;
                        }
                        None => {
                            tracing::info!(url = %url, "Stream closed by server");
                            break;
                        }
                    }
                }
            }
            Err(e) => tracing::warn!(url = %url, error = %e, "Stream connection failed"),
        }

        if !shared.set_state(generation, ConnectionState::Error) {
            return;
        }
        tracing::debug!(delay_ms = reconnect_delay.as_millis() as u64, "Reconnect scheduled");
        tokio::time::sleep(reconnect_delay).await;
    }
}
