use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::types::{Decimal, Map};

/// Message types understood by the analytics channel.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
    /// Full replacement of the dashboard analytics
    AnalyticsUpdate,
    /// A single order placed in real time
    NewOrder,
    /// Partial update of real-time metrics
    MetricsUpdate,
    /// Informational status, also used for heartbeats and probes
    ConnectionStatus,
}

impl MessageType {
    /// Classify a wire tag. Unknown tags yield `None`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "analytics_update" => Some(Self::AnalyticsUpdate),
            "new_order" => Some(Self::NewOrder),
            "metrics_update" => Some(Self::MetricsUpdate),
            "connection_status" => Some(Self::ConnectionStatus),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AnalyticsUpdate => "analytics_update",
            Self::NewOrder => "new_order",
            Self::MetricsUpdate => "metrics_update",
            Self::ConnectionStatus => "connection_status",
        }
    }
}

/// Wire envelope shared by inbound and outbound frames.
///
/// ```json
/// { "type": "new_order", "data": { ... }, "timestamp": "2026-01-05T14:03:00.000Z" }
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Raw type tag, kept as a string so unknown tags survive parsing
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Type-specific payload
    #[serde(default)]
    pub data: Value,
    /// ISO-8601 timestamp set by the sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A frame received from the server.
pub type InboundMessage = Envelope;

/// A frame submitted by the application. The client stamps `timestamp` at send time
/// when it is absent.
pub type OutboundMessage = Envelope;

impl Envelope {
    #[must_use]
    pub fn new(msg_type: MessageType, data: Value) -> Self {
        Self::custom(msg_type.as_str(), data)
    }

    /// Build a message with an arbitrary type tag.
    #[must_use]
    pub fn custom(msg_type: &str, data: Value) -> Self {
        Self {
            msg_type: msg_type.to_owned(),
            data,
            timestamp: None,
        }
    }

    /// Keep-alive sent by the heartbeat driver.
    #[must_use]
    pub fn heartbeat() -> Self {
        Self::new(MessageType::ConnectionStatus, json!({ "status": "ping" }))
    }

    /// Probe sent by a health check.
    #[must_use]
    pub fn health_probe(probe_id: Uuid) -> Self {
        Self::new(
            MessageType::ConnectionStatus,
            json!({ "status": "health_check", "probe_id": probe_id }),
        )
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(format_timestamp(timestamp));
        self
    }

    /// Set `timestamp` to `now` unless the caller already provided one.
    pub(crate) fn stamp(&mut self, now: DateTime<Utc>) {
        if self.timestamp.is_none() {
            self.timestamp = Some(format_timestamp(now));
        }
    }

    /// Classified message type, `None` for tags this client does not know.
    #[must_use]
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::from_tag(&self.msg_type)
    }

    /// Sender timestamp, if present and valid RFC 3339.
    #[must_use]
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }

    /// Deserialize `data` into a typed payload.
    pub fn payload<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.data)
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Dashboard analytics carried by `analytics_update`. Replaces the stored snapshot wholesale.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    /// Headline metrics (revenue, orders, conversion, ...)
    #[serde(default)]
    pub metrics: Map,
    /// Best-selling products
    #[serde(default)]
    pub top_products: Vec<Value>,
    /// Sales broken down by product category
    #[serde(default)]
    pub sales_by_category: Vec<Value>,
    /// Month-over-month trend points
    #[serde(default)]
    pub monthly_trends: Vec<Value>,
}

/// Payload of `new_order`.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Order identifier, string or number depending on the emitter
    #[serde(default, alias = "order_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Order total in COP
    #[serde(alias = "amount")]
    pub total_amount: Decimal,
    /// Product category of the order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Order record appended to the store for the real-time feed.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeOrder {
    pub order_id: Option<String>,
    pub amount: Decimal,
    pub category: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl RealtimeOrder {
    #[must_use]
    pub fn from_new_order(order: NewOrder, received_at: DateTime<Utc>) -> Self {
        let order_id = order.id.map(|id| match id {
            Value::String(s) => s,
            other => other.to_string(),
        });
        Self {
            order_id,
            amount: order.total_amount,
            category: order.category,
            received_at,
        }
    }
}
