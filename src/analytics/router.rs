//! Dispatch of inbound frames to the store and to listeners.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::events::{ClientEvent, EventEmitter};
use super::store::AnalyticsStore;
use super::types::{AnalyticsSnapshot, InboundMessage, MessageType, NewOrder, RealtimeOrder};
use crate::ws::error::WsError;
use crate::ws::latency::{LatencySample, LatencyTracker};

/// Outcome of routing one text frame.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Handled as the given message type
    Handled(MessageType),
    /// Parsed, but the type tag is not one this client handles
    Unknown,
    /// Parsed, but the payload did not fit its type
    InvalidPayload(MessageType),
    /// Not a valid message envelope
    Unparseable,
}

/// Parses inbound frames, records latency and applies each message type's effects.
pub struct MessageRouter {
    store: Arc<dyn AnalyticsStore>,
    emitter: Arc<EventEmitter>,
    latency_warning_threshold: Duration,
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("latency_warning_threshold", &self.latency_warning_threshold)
            .finish_non_exhaustive()
    }
}

impl MessageRouter {
    #[must_use]
    pub fn new(
        store: Arc<dyn AnalyticsStore>,
        emitter: Arc<EventEmitter>,
        latency_warning_threshold: Duration,
    ) -> Self {
        Self {
            store,
            emitter,
            latency_warning_threshold,
        }
    }

    /// Route a frame received now.
    pub fn route(&self, text: &str, latency: &mut LatencyTracker) -> Routed {
        self.route_at(text, latency, Utc::now())
    }

    /// Route a frame received at `received_at`.
    ///
    /// A frame that fails to parse produces a single [`ClientEvent::Error`] and no other
    /// effects. Every parsed frame produces [`ClientEvent::Message`] before any
    /// type-specific event.
    pub fn route_at(
        &self,
        text: &str,
        latency: &mut LatencyTracker,
        received_at: DateTime<Utc>,
    ) -> Routed {
        let message: InboundMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse WebSocket message");
                self.emitter
                    .emit(&ClientEvent::error(WsError::MessageParse(e)));
                return Routed::Unparseable;
            }
        };

        if let Some(sent_at) = message.sent_at() {
            self.record_latency(latency, sent_at, received_at);
        }

        self.emitter.emit(&ClientEvent::Message(message.clone()));

        let Some(kind) = message.kind() else {
            tracing::warn!(msg_type = %message.msg_type, "Unknown message type");
            return Routed::Unknown;
        };

        let applied = match kind {
            MessageType::AnalyticsUpdate => self.apply_analytics(&message),
            MessageType::NewOrder => self.apply_new_order(&message, received_at),
            MessageType::MetricsUpdate => self.apply_metrics(message),
            MessageType::ConnectionStatus => {
                tracing::info!(status = %message.data, "Connection status");
                self.emitter
                    .emit(&ClientEvent::ConnectionStatus(message.data));
                Ok(())
            }
        };

        match applied {
            Ok(()) => Routed::Handled(kind),
            Err(reason) => {
                tracing::warn!(msg_type = %kind, %reason, "Invalid message payload");
                self.emitter
                    .emit(&ClientEvent::error(WsError::InvalidMessage(reason)));
                Routed::InvalidPayload(kind)
            }
        }
    }

    fn record_latency(
        &self,
        latency: &mut LatencyTracker,
        sent_at: DateTime<Utc>,
        received_at: DateTime<Utc>,
    ) {
        let sample = LatencySample::new(sent_at.timestamp_millis(), received_at.timestamp_millis());
        latency.record(sample);

        let threshold = i64::try_from(self.latency_warning_threshold.as_millis()).unwrap_or(i64::MAX);
        if sample.latency_ms() > threshold {
            tracing::warn!(
                latency_ms = sample.latency_ms(),
                threshold_ms = threshold,
                "High message latency"
            );
        }
    }

    fn apply_analytics(&self, message: &InboundMessage) -> Result<(), String> {
        let snapshot: AnalyticsSnapshot = message
            .payload()
            .map_err(|e| format!("analytics_update: {e}"))?;
        self.store.replace_analytics(snapshot.clone());
        self.emitter.emit(&ClientEvent::AnalyticsUpdate(snapshot));
        Ok(())
    }

    fn apply_new_order(
        &self,
        message: &InboundMessage,
        received_at: DateTime<Utc>,
    ) -> Result<(), String> {
        let order: NewOrder = message
            .payload()
            .map_err(|e| format!("new_order: {e}"))?;
        let order = RealtimeOrder::from_new_order(order, received_at);
        tracing::debug!(order_id = ?order.order_id, amount = %order.amount, "New order");
        self.store.push_realtime_order(order.clone());
        self.emitter.emit(&ClientEvent::NewOrder(order));
        Ok(())
    }

    fn apply_metrics(&self, message: InboundMessage) -> Result<(), String> {
        let Value::Object(metrics) = message.data else {
            return Err("metrics_update: data is not an object".to_owned());
        };
        self.store.merge_realtime_metrics(metrics.clone());
        self.emitter.emit(&ClientEvent::MetricsUpdate(metrics));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::analytics::events::EventKind;
    use crate::analytics::store::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        emitter: Arc<EventEmitter>,
        router: MessageRouter,
        latency: LatencyTracker,
        seen: Arc<Mutex<Vec<EventKind>>>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let emitter = Arc::new(EventEmitter::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in [
            EventKind::Message,
            EventKind::Error,
            EventKind::AnalyticsUpdate,
            EventKind::NewOrder,
            EventKind::MetricsUpdate,
            EventKind::ConnectionStatus,
        ] {
            let seen = Arc::clone(&seen);
            emitter.on(kind, move |event: &ClientEvent| {
                seen.lock().unwrap().push(event.kind());
            });
        }
        let router = MessageRouter::new(
            Arc::clone(&store) as Arc<dyn AnalyticsStore>,
            Arc::clone(&emitter),
            Duration::from_millis(1000),
        );
        Fixture {
            store,
            emitter,
            router,
            latency: LatencyTracker::new(),
            seen,
        }
    }

    fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn new_order_appends_and_emits_after_message() {
        let mut f = fixture();
        let frame = json!({
            "type": "new_order",
            "data": { "id": "A-17", "total_amount": 50000, "category": "electronics" },
            "timestamp": "2026-01-05T14:03:00.000Z"
        })
        .to_string();

        let routed = f
            .router
            .route_at(&frame, &mut f.latency, at("2026-01-05T14:03:00.250Z"));

        assert_eq!(routed, Routed::Handled(MessageType::NewOrder));
        assert_eq!(
            *f.seen.lock().unwrap(),
            vec![EventKind::Message, EventKind::NewOrder]
        );
        let orders = f.store.realtime_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].amount, dec!(50000));
        assert_eq!(orders[0].order_id.as_deref(), Some("A-17"));
        assert_eq!(f.latency.len(), 1);
        assert!((f.latency.average_ms() - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn analytics_update_replaces_snapshot() {
        let mut f = fixture();
        let frame = json!({
            "type": "analytics_update",
            "data": {
                "metrics": { "total_sales": 1_500_000 },
                "top_products": [{ "name": "Café de Huila" }],
                "sales_by_category": [],
                "monthly_trends": []
            }
        })
        .to_string();

        let routed = f.router.route(&frame, &mut f.latency);

        assert_eq!(routed, Routed::Handled(MessageType::AnalyticsUpdate));
        let analytics = f.store.analytics();
        assert_eq!(analytics.metrics["total_sales"], 1_500_000);
        assert_eq!(analytics.top_products.len(), 1);
        assert!(f.latency.is_empty());
    }

    #[test]
    fn metrics_update_merges() {
        let mut f = fixture();
        f.router.route(
            r#"{"type":"metrics_update","data":{"active_visitors":12,"conversion":0.4}}"#,
            &mut f.latency,
        );
        f.router.route(
            r#"{"type":"metrics_update","data":{"active_visitors":15}}"#,
            &mut f.latency,
        );

        let metrics = f.store.realtime_metrics();
        assert_eq!(metrics["active_visitors"], 15);
        assert_eq!(metrics["conversion"], 0.4);
    }

    #[test]
    fn metrics_update_with_non_object_is_invalid() {
        let mut f = fixture();
        let routed = f
            .router
            .route(r#"{"type":"metrics_update","data":[1,2]}"#, &mut f.latency);

        assert_eq!(routed, Routed::InvalidPayload(MessageType::MetricsUpdate));
        assert_eq!(
            *f.seen.lock().unwrap(),
            vec![EventKind::Message, EventKind::Error]
        );
        assert!(f.store.realtime_metrics().is_empty());
    }

    #[test]
    fn malformed_frame_emits_only_error() {
        let mut f = fixture();
        let routed = f.router.route("not json{", &mut f.latency);

        assert_eq!(routed, Routed::Unparseable);
        assert_eq!(*f.seen.lock().unwrap(), vec![EventKind::Error]);
        assert!(f.store.realtime_orders().is_empty());
        assert!(f.latency.is_empty());
    }

    #[test]
    fn unknown_type_emits_message_only() {
        let mut f = fixture();
        let routed = f.router.route(
            r#"{"type":"promo_banner","data":{"text":"hola"},"timestamp":"2026-01-05T14:03:00.000Z"}"#,
            &mut f.latency,
        );

        assert_eq!(routed, Routed::Unknown);
        assert_eq!(*f.seen.lock().unwrap(), vec![EventKind::Message]);
        assert_eq!(f.latency.len(), 1);
    }

    #[test]
    fn connection_status_has_no_store_effect() {
        let mut f = fixture();
        let routed = f.router.route(
            r#"{"type":"connection_status","data":{"status":"ok"}}"#,
            &mut f.latency,
        );

        assert_eq!(routed, Routed::Handled(MessageType::ConnectionStatus));
        assert_eq!(
            *f.seen.lock().unwrap(),
            vec![EventKind::Message, EventKind::ConnectionStatus]
        );
        assert!(f.store.realtime_metrics().is_empty());
        assert_eq!(f.emitter.listener_count(), 6);
    }
}
