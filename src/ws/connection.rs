#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff as _;
use chrono::Utc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt as _, StreamExt as _};
use secrecy::{ExposeSecret as _, SecretString};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep, interval_at, sleep, timeout};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;
use uuid::Uuid;

use super::backoff::ReconnectBackoff;
use super::config::Config;
use super::error::{CLOSE_ABNORMAL, CLOSE_NORMAL, CloseDisposition, WsError};
use super::latency::LatencyTracker;
use super::queue::OutboundQueue;
use crate::Result;
use crate::analytics::events::{ClientEvent, EventEmitter};
use crate::analytics::router::MessageRouter;
use crate::analytics::store::AnalyticsStore;
use crate::analytics::types::{Envelope, OutboundMessage};
use crate::auth::TokenSource;
use crate::error::Error;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Close code reported when the server's close frame carries no status.
const CLOSE_NO_STATUS: u16 = 1005;

const DISCONNECT_REASON: &str = "Client disconnect";

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    /// `connect` has never been called
    #[default]
    Idle,
    /// A connection attempt is in flight
    Connecting,
    /// Transport open; heartbeat running
    Open,
    /// Closing on request
    Closing,
    /// Transport closed; a reconnect may be pending
    Closed,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Point-in-time view of the connection, published after every change.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Snapshot {
    pub state: ConnectionState,
    /// Retries scheduled since the last successful open
    pub reconnect_attempts: u32,
    pub queued_messages: usize,
    /// Mean latency over the retained window, in milliseconds
    pub average_latency_ms: f64,
    /// When the current transport opened
    pub connected_since: Option<Instant>,
}

#[derive(Debug)]
enum Command {
    Connect { vendor_id: Option<String> },
    Disconnect,
    Send(OutboundMessage),
    HealthCheck(oneshot::Sender<bool>),
}

/// Result of one connection attempt, tagged with the generation that started it.
struct Attempt {
    generation: u64,
    started: Instant,
    result: std::result::Result<WsStream, WsError>,
}

/// Manages the WebSocket lifecycle: connection, reconnection, heartbeat and queueing.
///
/// All connection state is owned by a background task; this handle talks to it
/// over channels and is cheap to clone. The task exits once every handle is dropped.
///
/// # Example
///
/// ```ignore
/// let connection = ConnectionManager::new(endpoint, config, tokens, store, emitter)?;
/// connection.connect(Some("vendor-42"));
///
/// let mut state = connection.state_receiver();
/// while state.changed().await.is_ok() {
///     println!("{}", state.borrow().state);
/// }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    command_tx: mpsc::UnboundedSender<Command>,
    snapshot_rx: watch::Receiver<Snapshot>,
    emitter: Arc<EventEmitter>,
    config: Config,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("snapshot", &*self.snapshot_rx.borrow())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Validate `endpoint` and spawn the connection task. Nothing connects until
    /// [`Self::connect`] is called.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        endpoint: &str,
        config: Config,
        token_source: Arc<dyn TokenSource>,
        store: Arc<dyn AnalyticsStore>,
        emitter: Arc<EventEmitter>,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "Unsupported WebSocket scheme: {}",
                endpoint.scheme()
            )));
        }
        if config.heartbeat_interval.is_zero() {
            return Err(Error::validation("heartbeat_interval must be non-zero"));
        }
        if Instant::now().checked_add(config.heartbeat_interval).is_none() {
            return Err(Error::validation(format!(
                "heartbeat_interval is out of range: {:?}",
                config.heartbeat_interval
            )));
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());

        let task = ConnectionTask::new(
            endpoint,
            config.clone(),
            token_source,
            store,
            Arc::clone(&emitter),
            command_rx,
            snapshot_tx,
        );
        tokio::spawn(task.run());

        Ok(Self {
            command_tx,
            snapshot_rx,
            emitter,
            config,
        })
    }

    /// Start connecting. A no-op while an attempt is in flight or the transport is open.
    ///
    /// Resets the reconnect counter. Without an access token this logs an error and
    /// leaves the state unchanged.
    pub fn connect(&self, vendor_id: Option<&str>) {
        self.command(Command::Connect {
            vendor_id: vendor_id.map(str::to_owned),
        });
    }

    /// Cancel any pending reconnect and close the transport with a normal close code.
    pub fn disconnect(&self) {
        self.command(Command::Disconnect);
    }

    /// Transmit `message` now if open, otherwise queue it for the next open.
    pub fn send(&self, message: OutboundMessage) -> Result<()> {
        self.command_tx
            .send(Command::Send(message))
            .map_err(|_e| WsError::ConnectionClosed)?;
        Ok(())
    }

    /// Send a probe and wait for any frame from the server.
    ///
    /// Returns `false` when not open or when nothing arrives within
    /// [`Config::health_check_timeout`].
    pub async fn health_check(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.command_tx.send(Command::HealthCheck(reply_tx)).is_err() {
            return false;
        }
        matches!(
            timeout(self.config.health_check_timeout, reply_rx).await,
            Ok(Ok(true))
        )
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        *self.snapshot_rx.borrow()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.snapshot_rx.borrow().state
    }

    /// Subscribe to snapshot changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_rx.clone()
    }

    #[must_use]
    pub fn emitter(&self) -> &Arc<EventEmitter> {
        &self.emitter
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn command(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            tracing::warn!("Connection task has stopped");
        }
    }
}

/// State owned by the background connection task.
struct ConnectionTask {
    endpoint: Url,
    config: Config,
    token_source: Arc<dyn TokenSource>,
    store: Arc<dyn AnalyticsStore>,
    emitter: Arc<EventEmitter>,
    router: MessageRouter,

    command_rx: mpsc::UnboundedReceiver<Command>,
    attempt_tx: mpsc::UnboundedSender<Attempt>,
    attempt_rx: mpsc::UnboundedReceiver<Attempt>,
    snapshot_tx: watch::Sender<Snapshot>,

    state: ConnectionState,
    /// Bumped for every attempt and on disconnect; results from older generations are discarded
    generation: u64,
    pending_attempt: Option<JoinHandle<()>>,
    vendor_id: Option<String>,
    backoff: ReconnectBackoff,
    reconnect_timer: Option<Pin<Box<Sleep>>>,

    sink: Option<WsSink>,
    source: Option<WsSource>,
    heartbeat: Option<Interval>,
    last_frame_at: Instant,
    connected_since: Option<Instant>,

    queue: OutboundQueue<OutboundMessage>,
    latency: LatencyTracker,
    health_waiters: Vec<oneshot::Sender<bool>>,
}

impl ConnectionTask {
    fn new(
        endpoint: Url,
        config: Config,
        token_source: Arc<dyn TokenSource>,
        store: Arc<dyn AnalyticsStore>,
        emitter: Arc<EventEmitter>,
        command_rx: mpsc::UnboundedReceiver<Command>,
        snapshot_tx: watch::Sender<Snapshot>,
    ) -> Self {
        let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();
        let router = MessageRouter::new(
            Arc::clone(&store),
            Arc::clone(&emitter),
            config.latency_warning_threshold,
        );

        Self {
            endpoint,
            backoff: ReconnectBackoff::new(config.reconnect.clone()),
            queue: OutboundQueue::new(config.max_queued_messages),
            config,
            token_source,
            store,
            emitter,
            router,
            command_rx,
            attempt_tx,
            attempt_rx,
            snapshot_tx,
            state: ConnectionState::Idle,
            generation: 0,
            pending_attempt: None,
            vendor_id: None,
            reconnect_timer: None,
            sink: None,
            source: None,
            heartbeat: None,
            last_frame_at: Instant::now(),
            connected_since: None,
            latency: LatencyTracker::new(),
            health_waiters: Vec::new(),
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        self.disconnect().await;
                        break;
                    };
                    self.handle_command(command).await;
                }
                Some(attempt) = self.attempt_rx.recv() => self.handle_attempt(attempt).await,
                frame = next_frame(&mut self.source) => self.handle_frame(frame),
                () = reconnect_due(&mut self.reconnect_timer) => self.reconnect(),
                () = heartbeat_due(&mut self.heartbeat) => self.send_heartbeat().await,
            }
            self.publish();
        }
        tracing::debug!("Connection task stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { vendor_id } => self.connect(vendor_id),
            Command::Disconnect => self.disconnect().await,
            Command::Send(message) => self.send(message).await,
            Command::HealthCheck(reply) => self.health_check(reply).await,
        }
    }

    fn connect(&mut self, vendor_id: Option<String>) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            tracing::debug!(state = %self.state, "Already connecting or connected");
            return;
        }
        let Some(token) = self.token_source.access_token() else {
            tracing::error!(error = %WsError::MissingToken, "Not connecting");
            return;
        };

        self.reconnect_timer = None;
        self.backoff.reset();
        self.vendor_id = vendor_id;
        self.begin_attempt(&token);
    }

    fn begin_attempt(&mut self, token: &SecretString) {
        let request = String::from(connection_url(
            &self.endpoint,
            token,
            self.vendor_id.as_deref(),
        ));

        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        if let Some(handle) = self.pending_attempt.take() {
            handle.abort();
        }
        self.set_state(ConnectionState::Connecting);

        tracing::debug!(
            endpoint = %self.redacted_endpoint(),
            attempt = self.backoff.attempt(),
            "Connecting"
        );

        let attempt_tx = self.attempt_tx.clone();
        let connect_timeout = self.config.connect_timeout;
        self.pending_attempt = Some(tokio::spawn(async move {
            let started = Instant::now();
            let result = match timeout(connect_timeout, connect_async(request)).await {
                Ok(Ok((stream, _response))) => Ok(stream),
                Ok(Err(e)) => Err(WsError::Connection(e)),
                Err(_elapsed) => Err(WsError::Timeout),
            };
            _ = attempt_tx.send(Attempt {
                generation,
                started,
                result,
            });
        }));
    }

    fn redacted_endpoint(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        url
    }

    async fn handle_attempt(&mut self, attempt: Attempt) {
        if attempt.generation != self.generation {
            tracing::debug!(
                generation = attempt.generation,
                current = self.generation,
                "Discarding stale connection attempt"
            );
            if let Ok(mut stream) = attempt.result {
                tokio::spawn(async move {
                    _ = stream.close(None).await;
                });
            }
            return;
        }
        self.pending_attempt = None;

        match attempt.result {
            Ok(stream) => self.on_open(stream, attempt.started.elapsed()).await,
            Err(e) => {
                tracing::warn!(error = %e, "Unable to connect");
                let reason = e.to_string();
                self.emit(&ClientEvent::error(e));
                self.on_close(CLOSE_ABNORMAL, reason);
            }
        }
    }

    async fn on_open(&mut self, stream: WsStream, connect_duration: Duration) {
        let (sink, source) = stream.split();
        self.sink = Some(sink);
        self.source = Some(source);

        let now = Instant::now();
        self.backoff.reset();
        self.last_frame_at = now;
        self.connected_since = Some(now);
        self.set_state(ConnectionState::Open);
        self.store.set_connected(true);

        let period = self.config.heartbeat_interval;
        if let Some(start) = now.checked_add(period) {
            let mut heartbeat = interval_at(start, period);
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.heartbeat = Some(heartbeat);
        } else {
            tracing::warn!(?period, "Heartbeat interval out of range, heartbeat disabled");
        }

        tracing::info!(?connect_duration, "WebSocket connected");

        // Listeners see the open before any flush failure can close it again.
        self.emit(&ClientEvent::Connected { connect_duration });
        self.flush_queue().await;
    }

    /// Drain queued messages in order. Stops at the first failure, leaving the
    /// failed message at the head of the queue.
    async fn flush_queue(&mut self) {
        if !self.queue.is_empty() {
            tracing::debug!(count = self.queue.len(), "Flushing queued messages");
        }
        while let Some(message) = self.queue.pop() {
            if let Err((message, e)) = self.transmit(message).await {
                self.queue.requeue(message);
                self.transport_failed(e);
                return;
            }
        }
    }

    async fn send(&mut self, message: OutboundMessage) {
        if !self.state.is_connected() {
            self.enqueue(message);
            return;
        }
        if let Err((message, e)) = self.transmit(message).await {
            self.queue.requeue(message);
            self.transport_failed(e);
        }
    }

    fn enqueue(&mut self, message: OutboundMessage) {
        if let Some(evicted) = self.queue.push(message) {
            tracing::warn!(
                msg_type = %evicted.msg_type,
                capacity = self.config.max_queued_messages,
                "Outbound queue full, dropped oldest message"
            );
        }
    }

    /// Stamp and write one message within `write_timeout`. On failure the message is
    /// handed back unstamped (unless the caller supplied a timestamp) so it can be
    /// queued again.
    async fn transmit(
        &mut self,
        mut message: OutboundMessage,
    ) -> std::result::Result<(), (OutboundMessage, WsError)> {
        let caller_timestamp = message.timestamp.is_some();
        message.stamp(Utc::now());

        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unserializable message");
                self.emit(&ClientEvent::error(e));
                return Ok(());
            }
        };

        let result = match self.sink.as_mut() {
            Some(sink) => match timeout(
                self.config.write_timeout,
                sink.send(Message::Text(text.into())),
            )
            .await
            {
                Ok(sent) => sent.map_err(WsError::Connection),
                Err(_elapsed) => Err(WsError::Timeout),
            },
            None => Err(WsError::ConnectionClosed),
        };
        if let Err(e) = result {
            if !caller_timestamp {
                message.timestamp = None;
            }
            return Err((message, e));
        }

        tracing::trace!(msg_type = %message.msg_type, "Sent WebSocket message");
        Ok(())
    }

    fn transport_failed(&mut self, error: WsError) {
        tracing::warn!(error = %error, "WebSocket write failed");
        let reason = error.to_string();
        self.emit(&ClientEvent::error(error));
        self.on_close(CLOSE_ABNORMAL, reason);
    }

    fn handle_frame(&mut self, frame: Option<std::result::Result<Message, tungstenite::Error>>) {
        match frame {
            Some(Ok(Message::Close(close))) => {
                let (code, reason) = close.map_or_else(
                    || (CLOSE_NO_STATUS, String::new()),
                    |frame| (u16::from(frame.code), frame.reason.as_str().to_owned()),
                );
                self.on_close(code, reason);
            }
            Some(Ok(message)) => {
                self.last_frame_at = Instant::now();
                self.resolve_health_checks(true);
                if let Message::Text(text) = message {
                    tracing::trace!(%text, "Received WebSocket text message");
                    self.router.route(text.as_str(), &mut self.latency);
                }
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "WebSocket read failed");
                let reason = e.to_string();
                self.emit(&ClientEvent::error(e));
                self.on_close(CLOSE_ABNORMAL, reason);
            }
            None => self.on_close(CLOSE_ABNORMAL, "Connection closed".to_owned()),
        }
    }

    /// Tear down the transport and decide what happens next based on `code`.
    fn on_close(&mut self, code: u16, reason: String) {
        self.teardown();
        self.set_state(ConnectionState::Closed);
        self.store.set_connected(false);

        tracing::info!(code, %reason, "WebSocket closed");
        self.emit(&ClientEvent::Disconnected {
            code,
            reason: reason.clone(),
        });

        match CloseDisposition::classify(code) {
            CloseDisposition::AuthenticationFailed => {
                tracing::warn!(error = %WsError::AuthenticationFailed, %reason, "Not reconnecting");
                self.emit(&ClientEvent::AuthenticationFailed { reason });
            }
            CloseDisposition::AuthenticationRequired => {
                tracing::warn!(error = %WsError::AuthenticationRequired, "Not reconnecting");
                self.emit(&ClientEvent::AuthenticationRequired);
            }
            CloseDisposition::Clean => {}
            CloseDisposition::Transient => self.schedule_reconnect(),
        }
    }

    fn schedule_reconnect(&mut self) {
        let Some(delay) = self.backoff.next_backoff() else {
            let attempts = self.backoff.attempt();
            tracing::warn!(attempts, "Max reconnect attempts reached");
            self.emit(&ClientEvent::MaxReconnectAttemptsReached { attempts });
            return;
        };

        let attempt = self.backoff.attempt();
        tracing::info!(
            attempt,
            max_attempts = self.backoff.max_attempts(),
            ?delay,
            "Scheduling reconnect"
        );
        self.reconnect_timer = Some(Box::pin(sleep(delay)));
        self.emit(&ClientEvent::Reconnecting { attempt, delay });
    }

    /// Reconnect timer fired.
    fn reconnect(&mut self) {
        self.reconnect_timer = None;
        let Some(token) = self.token_source.access_token() else {
            tracing::warn!("Access token no longer available, abandoning reconnect");
            self.emit(&ClientEvent::AuthenticationRequired);
            return;
        };
        self.begin_attempt(&token);
    }

    async fn send_heartbeat(&mut self) {
        let silence = self.last_frame_at.elapsed();
        let liveness_timeout = self.config.heartbeat_timeout();
        if silence > liveness_timeout {
            tracing::warn!(
                ?silence,
                ?liveness_timeout,
                "No frames from server within liveness timeout"
            );
            self.on_close(CLOSE_ABNORMAL, "Heartbeat timeout".to_owned());
            return;
        }

        if let Err((_, e)) = self.transmit(Envelope::heartbeat()).await {
            self.transport_failed(e);
        }
    }

    async fn health_check(&mut self, reply: oneshot::Sender<bool>) {
        if !self.state.is_connected() {
            _ = reply.send(false);
            return;
        }
        self.add_health_waiter(reply);
        if let Err((_, e)) = self.transmit(Envelope::health_probe(Uuid::new_v4())).await {
            self.transport_failed(e);
        }
    }

    /// Waiters whose caller already timed out are pruned first.
    fn add_health_waiter(&mut self, reply: oneshot::Sender<bool>) {
        self.health_waiters.retain(|waiter| !waiter.is_closed());
        self.health_waiters.push(reply);
    }

    fn resolve_health_checks(&mut self, healthy: bool) {
        for waiter in self.health_waiters.drain(..) {
            _ = waiter.send(healthy);
        }
    }

    async fn disconnect(&mut self) {
        self.reconnect_timer = None;
        if let Some(handle) = self.pending_attempt.take() {
            handle.abort();
        }
        // Any attempt result still in the channel is now stale.
        self.generation = self.generation.wrapping_add(1);
        self.heartbeat = None;

        let was_open = self.sink.is_some();
        if let Some(mut sink) = self.sink.take() {
            self.set_state(ConnectionState::Closing);
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: DISCONNECT_REASON.into(),
            };
            match timeout(
                self.config.write_timeout,
                sink.send(Message::Close(Some(frame))),
            )
            .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "Close frame not delivered"),
                Err(_elapsed) => tracing::debug!("Timed out sending close frame"),
            }
        }

        self.teardown();
        if self.state != ConnectionState::Idle {
            self.set_state(ConnectionState::Closed);
        }
        self.store.set_connected(false);

        if was_open {
            tracing::info!("WebSocket disconnected");
            self.emit(&ClientEvent::Disconnected {
                code: CLOSE_NORMAL,
                reason: DISCONNECT_REASON.to_owned(),
            });
        }
    }

    fn teardown(&mut self) {
        self.sink = None;
        self.source = None;
        self.heartbeat = None;
        self.connected_since = None;
        self.resolve_health_checks(false);
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = %self.state, to = %state, "Connection state changed");
        self.state = state;
        self.store.set_connection_state(state);
        self.publish();
    }

    fn publish(&self) {
        let snapshot = Snapshot {
            state: self.state,
            reconnect_attempts: self.backoff.attempt(),
            queued_messages: self.queue.len(),
            average_latency_ms: self.latency.average_ms(),
            connected_since: self.connected_since,
        };
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    /// Publish the latest snapshot, then deliver `event`, so listeners observe
    /// state consistent with the event.
    fn emit(&self, event: &ClientEvent) {
        self.publish();
        self.emitter.emit(event);
    }
}

/// Endpoint with the bearer token and vendor appended as query parameters.
fn connection_url(endpoint: &Url, token: &SecretString, vendor_id: Option<&str>) -> Url {
    let mut url = endpoint.clone();
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("token", token.expose_secret());
        if let Some(vendor_id) = vendor_id {
            query.append_pair("vendor_id", vendor_id);
        }
    }
    url
}

async fn next_frame(
    source: &mut Option<WsSource>,
) -> Option<std::result::Result<Message, tungstenite::Error>> {
    match source {
        Some(source) => source.next().await,
        None => pending().await,
    }
}

async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

async fn heartbeat_due(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(heartbeat) => {
            heartbeat.tick().await;
        }
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::store::InMemoryStore;
    use crate::auth::{StaticToken, TokenStore};

    fn manager(endpoint: &str, config: Config) -> Result<ConnectionManager> {
        ConnectionManager::new(
            endpoint,
            config,
            Arc::new(StaticToken::new("abc".to_owned())),
            Arc::new(InMemoryStore::new()),
            Arc::new(EventEmitter::new()),
        )
    }

    #[test]
    fn state_names() {
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert_eq!(ConnectionState::Idle.to_string(), "idle");
        assert!(ConnectionState::Open.is_connected());
        assert!(!ConnectionState::Closing.is_connected());
    }

    #[tokio::test]
    async fn rejects_non_websocket_scheme() {
        let error = manager("https://example.com/ws", Config::default()).unwrap_err();
        assert_eq!(error.kind(), crate::error::Kind::Validation);
    }

    #[tokio::test]
    async fn rejects_zero_heartbeat() {
        let config = Config::builder().heartbeat_interval(Duration::ZERO).build();
        let error = manager("ws://localhost:8000/ws/analytics", config).unwrap_err();
        assert_eq!(error.kind(), crate::error::Kind::Validation);
    }

    #[tokio::test]
    async fn rejects_unrepresentable_heartbeat() {
        let config = Config::builder().heartbeat_interval(Duration::MAX).build();
        let error = manager("ws://localhost:8000/ws/analytics", config).unwrap_err();
        assert_eq!(error.kind(), crate::error::Kind::Validation);
    }

    #[tokio::test]
    async fn connect_without_token_stays_idle() {
        let store = Arc::new(InMemoryStore::new());
        let connection = ConnectionManager::new(
            "ws://127.0.0.1:9/ws",
            Config::default(),
            Arc::new(TokenStore::new()),
            Arc::clone(&store) as Arc<dyn AnalyticsStore>,
            Arc::new(EventEmitter::new()),
        )
        .unwrap();

        connection.connect(None);
        // Round-trip a command so the connect has been processed.
        assert!(!connection.health_check().await);

        assert_eq!(connection.state(), ConnectionState::Idle);
        assert!(!store.is_connected());
    }

    #[tokio::test]
    async fn sends_while_idle_are_queued() {
        let connection = manager("ws://127.0.0.1:9/ws", Config::default()).unwrap();
        let mut snapshots = connection.state_receiver();

        connection.send(Envelope::heartbeat()).unwrap();
        connection.send(Envelope::heartbeat()).unwrap();

        snapshots
            .wait_for(|snapshot| snapshot.queued_messages == 2)
            .await
            .unwrap();
        assert_eq!(connection.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn abandoned_health_checks_are_pruned() {
        let (_command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _snapshot_rx) = watch::channel(Snapshot::default());
        let store: Arc<dyn AnalyticsStore> = Arc::new(InMemoryStore::new());
        let mut task = ConnectionTask::new(
            Url::parse("ws://127.0.0.1:9/ws").unwrap(),
            Config::default(),
            Arc::new(StaticToken::new("abc".to_owned())),
            store,
            Arc::new(EventEmitter::new()),
            command_rx,
            snapshot_tx,
        );

        for _ in 0..3 {
            let (reply_tx, reply_rx) = oneshot::channel();
            drop(reply_rx);
            task.add_health_waiter(reply_tx);
        }
        let (reply_tx, mut reply_rx) = oneshot::channel();
        task.add_health_waiter(reply_tx);
        assert_eq!(task.health_waiters.len(), 1);

        task.resolve_health_checks(true);
        assert_eq!(reply_rx.try_recv(), Ok(true));
    }

    #[test]
    fn connection_url_appends_token_and_vendor() {
        let endpoint = Url::parse("wss://api.example.co/ws/analytics").unwrap();
        let token = SecretString::from("a b");

        let url = connection_url(&endpoint, &token, Some("v-1"));
        assert_eq!(
            url.as_str(),
            "wss://api.example.co/ws/analytics?token=a+b&vendor_id=v-1"
        );

        let url = connection_url(&endpoint, &token, None);
        assert_eq!(url.as_str(), "wss://api.example.co/ws/analytics?token=a+b");
    }
}
