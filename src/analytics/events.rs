//! Lifecycle and data events published to UI code.
//!
//! Two delivery styles are supported:
//!
//! - [`EventEmitter::on`] / [`EventEmitter::off`]: synchronous callbacks keyed by
//!   [`EventKind`], invoked in registration order on the connection task
//! - [`EventEmitter::subscribe`]: an async broadcast receiver of every event
//!
//! A panicking callback is caught and logged; the remaining callbacks for that
//! emission still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;

use super::types::{AnalyticsSnapshot, InboundMessage, RealtimeOrder};
use crate::error::Error;
use crate::types::Map;

/// Broadcast channel capacity for events.
const BROADCAST_CAPACITY: usize = 1024;

/// Event names, in the camelCase form UI code registers against.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "camelCase")]
pub enum EventKind {
    Connected,
    Disconnected,
    Error,
    AuthenticationFailed,
    AuthenticationRequired,
    MaxReconnectAttemptsReached,
    Reconnecting,
    Message,
    AnalyticsUpdate,
    NewOrder,
    MetricsUpdate,
    ConnectionStatus,
}

/// An event emitted by the client.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Transport opened
    Connected {
        /// Time from starting the attempt to the open handshake completing
        connect_duration: Duration,
    },
    /// Transport closed, for any reason
    Disconnected { code: u16, reason: String },
    /// Transport or protocol failure; the connection may still be open
    Error(Arc<Error>),
    /// Server closed with the "authentication failed" code
    AuthenticationFailed { reason: String },
    /// No token was available, or the server closed with "authentication required"
    AuthenticationRequired,
    /// Retries are exhausted until the next explicit `connect`
    MaxReconnectAttemptsReached { attempts: u32 },
    /// A retry has been scheduled
    Reconnecting { attempt: u32, delay: Duration },
    /// Any successfully parsed inbound frame
    Message(InboundMessage),
    AnalyticsUpdate(AnalyticsSnapshot),
    NewOrder(RealtimeOrder),
    MetricsUpdate(Map),
    ConnectionStatus(Value),
}

impl ClientEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected { .. } => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::Error(_) => EventKind::Error,
            Self::AuthenticationFailed { .. } => EventKind::AuthenticationFailed,
            Self::AuthenticationRequired => EventKind::AuthenticationRequired,
            Self::MaxReconnectAttemptsReached { .. } => EventKind::MaxReconnectAttemptsReached,
            Self::Reconnecting { .. } => EventKind::Reconnecting,
            Self::Message(_) => EventKind::Message,
            Self::AnalyticsUpdate(_) => EventKind::AnalyticsUpdate,
            Self::NewOrder(_) => EventKind::NewOrder,
            Self::MetricsUpdate(_) => EventKind::MetricsUpdate,
            Self::ConnectionStatus(_) => EventKind::ConnectionStatus,
        }
    }

    pub(crate) fn error<E: Into<Error>>(error: E) -> Self {
        Self::Error(Arc::new(error.into()))
    }
}

/// Handle returned by [`EventEmitter::on`], used to remove the callback again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Publish/subscribe registry for [`ClientEvent`]s.
pub struct EventEmitter {
    listeners: DashMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
    broadcast_tx: broadcast::Sender<ClientEvent>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            listeners: DashMap::new(),
            next_id: AtomicU64::new(0),
            broadcast_tx,
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for events of `kind`.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered under `kind`.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let Some(mut entry) = self.listeners.get_mut(&kind) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|(listener_id, _)| *listener_id != id);
        before != entry.len()
    }

    /// Remove every registered callback. Broadcast subscribers are unaffected.
    pub fn clear(&self) {
        self.listeners.clear();
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.iter().map(|entry| entry.value().len()).sum()
    }

    /// Receive every emitted event asynchronously.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Deliver `event` to its callbacks, then to broadcast subscribers.
    pub fn emit(&self, event: &ClientEvent) {
        let kind = event.kind();
        // Snapshot so callbacks may call `on`/`off` without deadlocking the map shard.
        let listeners: Vec<Listener> = self
            .listeners
            .get(&kind)
            .map(|entry| entry.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!(event = %kind, "Event listener panicked");
            }
        }

        _ = self.broadcast_tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    type Calls = Arc<Mutex<Vec<&'static str>>>;

    fn record(calls: &Calls, name: &'static str) -> impl Fn(&ClientEvent) + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move |_: &ClientEvent| calls.lock().unwrap().push(name)
    }

    #[test]
    fn event_names_are_camel_case() {
        assert_eq!(EventKind::Connected.to_string(), "connected");
        assert_eq!(
            EventKind::MaxReconnectAttemptsReached.to_string(),
            "maxReconnectAttemptsReached"
        );
        assert_eq!(EventKind::AnalyticsUpdate.to_string(), "analyticsUpdate");
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let emitter = EventEmitter::new();
        let calls = Calls::default();
        emitter.on(EventKind::AuthenticationRequired, record(&calls, "first"));
        emitter.on(EventKind::AuthenticationRequired, record(&calls, "second"));
        emitter.on(EventKind::Connected, record(&calls, "other"));

        emitter.emit(&ClientEvent::AuthenticationRequired);

        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn off_removes_only_that_callback() {
        let emitter = EventEmitter::new();
        let calls = Calls::default();
        let first = emitter.on(EventKind::AuthenticationRequired, record(&calls, "first"));
        emitter.on(EventKind::AuthenticationRequired, record(&calls, "second"));

        assert!(emitter.off(EventKind::AuthenticationRequired, first));
        assert!(!emitter.off(EventKind::AuthenticationRequired, first));
        assert!(!emitter.off(EventKind::Connected, first));

        emitter.emit(&ClientEvent::AuthenticationRequired);
        assert_eq!(*calls.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn panicking_listener_does_not_stop_siblings() {
        let emitter = EventEmitter::new();
        let calls = Calls::default();
        emitter.on(EventKind::AuthenticationRequired, record(&calls, "before"));
        emitter.on(EventKind::AuthenticationRequired, |_: &ClientEvent| {
            panic!("listener failure");
        });
        emitter.on(EventKind::AuthenticationRequired, record(&calls, "after"));

        emitter.emit(&ClientEvent::AuthenticationRequired);

        assert_eq!(*calls.lock().unwrap(), vec!["before", "after"]);
    }

    #[test]
    fn clear_drops_callbacks_but_keeps_broadcast() {
        let emitter = EventEmitter::new();
        let calls = Calls::default();
        emitter.on(EventKind::AuthenticationRequired, record(&calls, "cleared"));
        let mut rx = emitter.subscribe();

        emitter.clear();
        assert_eq!(emitter.listener_count(), 0);
        emitter.emit(&ClientEvent::AuthenticationRequired);

        assert!(calls.lock().unwrap().is_empty());
        assert!(matches!(
            rx.try_recv(),
            Ok(ClientEvent::AuthenticationRequired)
        ));
    }

    #[test]
    fn listener_may_register_during_emit() {
        let emitter = Arc::new(EventEmitter::new());
        let inner = Arc::clone(&emitter);
        emitter.on(EventKind::AuthenticationRequired, move |_: &ClientEvent| {
            inner.on(EventKind::Connected, |_: &ClientEvent| {});
        });

        emitter.emit(&ClientEvent::AuthenticationRequired);
        assert_eq!(emitter.listener_count(), 2);
    }
}
