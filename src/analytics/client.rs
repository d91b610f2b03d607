use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;

use super::events::{ClientEvent, EventEmitter, EventKind, ListenerId};
use super::store::AnalyticsStore;
use super::types::{InboundMessage, OutboundMessage};
use crate::Result;
use crate::auth::TokenSource;
use crate::ws::config::Config;
use crate::ws::connection::{ConnectionManager, ConnectionState, Snapshot};
use crate::ws::error::WsError;
use crate::ws::traits::RealtimeService;

/// Composite health report for a status indicator.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionHealth {
    /// Open, with average latency under the warning threshold
    pub healthy: bool,
    pub average_latency_ms: f64,
    pub reconnect_attempts: u32,
    pub queued_messages: usize,
    pub state: ConnectionState,
    /// Time since the current transport opened
    pub uptime: Option<Duration>,
}

/// Real-time analytics client for the vendor dashboard.
///
/// Construct one per session and share it; clones refer to the same connection.
///
/// # Examples
///
/// ```rust, no_run
/// use std::sync::Arc;
///
/// use marketplace_realtime::analytics::events::{ClientEvent, EventKind};
/// use marketplace_realtime::analytics::{Client, InMemoryStore};
/// use marketplace_realtime::auth::EnvToken;
/// use marketplace_realtime::ws::config::Config;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let store = Arc::new(InMemoryStore::new());
///     let client = Client::new(
///         "wss://api.example.co/ws/analytics",
///         Config::default(),
///         Arc::new(EnvToken::default()),
///         Arc::clone(&store) as _,
///     )?;
///
///     client.on(EventKind::NewOrder, |event: &ClientEvent| {
///         if let ClientEvent::NewOrder(order) = event {
///             println!("New order: {} COP", order.amount);
///         }
///     });
///     client.connect(Some("vendor-42"));
///
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    connection: ConnectionManager,
}

impl Client {
    /// Create a client for `endpoint`. Must be called from within a Tokio runtime.
    pub fn new(
        endpoint: &str,
        config: Config,
        token_source: Arc<dyn TokenSource>,
        store: Arc<dyn AnalyticsStore>,
    ) -> Result<Self> {
        let emitter = Arc::new(EventEmitter::new());
        let connection = ConnectionManager::new(endpoint, config, token_source, store, emitter)?;

        Ok(Self {
            inner: Arc::new(ClientInner { connection }),
        })
    }

    /// Connect, optionally scoped to a vendor. See [`ConnectionManager::connect`].
    pub fn connect(&self, vendor_id: Option<&str>) {
        self.inner.connection.connect(vendor_id);
    }

    /// Close the connection, cancel pending retries and remove every `on` callback.
    ///
    /// Callbacks are removed immediately, so they do not observe the resulting
    /// `disconnected` event; [`Self::events`] receivers do.
    pub fn disconnect(&self) {
        self.inner.connection.emitter().clear();
        self.inner.connection.disconnect();
    }

    /// Send now if open, otherwise queue until the next open.
    pub fn send(&self, message: OutboundMessage) -> Result<()> {
        self.inner.connection.send(message)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connection.state().is_connected()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Rolling average latency in milliseconds over the last 100 timestamped messages.
    #[must_use]
    pub fn average_latency(&self) -> f64 {
        self.inner.connection.snapshot().average_latency_ms
    }

    #[must_use]
    pub fn connection_health(&self) -> ConnectionHealth {
        health(
            &self.inner.connection.snapshot(),
            self.inner.connection.config().latency_warning_threshold,
        )
    }

    /// Send a probe and wait for any reply within the configured timeout.
    pub async fn perform_health_check(&self) -> bool {
        self.inner.connection.health_check().await
    }

    /// Register a callback for one event kind.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner.connection.emitter().on(kind, callback)
    }

    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.inner.connection.emitter().off(kind, id)
    }

    /// Receive every event asynchronously. Unaffected by [`Self::disconnect`].
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.connection.emitter().subscribe()
    }

    /// Stream of parsed inbound messages.
    pub fn messages(&self) -> impl Stream<Item = Result<InboundMessage>> + use<> {
        let mut rx = self.events();

        try_stream! {
            loop {
                match rx.recv().await {
                    Ok(ClientEvent::Message(message)) => yield message,
                    Ok(_) => {}
                    Err(RecvError::Lagged(count)) => {
                        tracing::warn!("Message stream lagged, missed {count} events");
                        Err(WsError::Lagged { count })?;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Subscribe to connection snapshots.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<Snapshot> {
        self.inner.connection.state_receiver()
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionManager {
        &self.inner.connection
    }
}

#[async_trait]
impl RealtimeService for Client {
    fn connect(&self, vendor_id: Option<&str>) {
        Self::connect(self, vendor_id);
    }

    fn disconnect(&self) {
        Self::disconnect(self);
    }

    fn send(&self, message: OutboundMessage) -> Result<()> {
        Self::send(self, message)
    }

    fn is_connected(&self) -> bool {
        Self::is_connected(self)
    }

    fn connection_state(&self) -> ConnectionState {
        Self::connection_state(self)
    }

    fn average_latency(&self) -> f64 {
        Self::average_latency(self)
    }

    fn connection_health(&self) -> ConnectionHealth {
        Self::connection_health(self)
    }

    async fn perform_health_check(&self) -> bool {
        Self::perform_health_check(self).await
    }

    fn emitter(&self) -> &EventEmitter {
        self.inner.connection.emitter()
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "Latency is tracked as fractional milliseconds"
)]
fn health(snapshot: &Snapshot, latency_warning_threshold: Duration) -> ConnectionHealth {
    let threshold_ms = latency_warning_threshold.as_secs_f64() * 1000.0;
    ConnectionHealth {
        healthy: snapshot.state.is_connected() && snapshot.average_latency_ms < threshold_ms,
        average_latency_ms: snapshot.average_latency_ms,
        reconnect_attempts: snapshot.reconnect_attempts,
        queued_messages: snapshot.queued_messages,
        state: snapshot.state,
        uptime: snapshot.connected_since.map(|since| since.elapsed()),
    }
}
