//! Capability interface for the realtime connection.

use async_trait::async_trait;

use super::connection::ConnectionState;
use crate::Result;
use crate::analytics::client::ConnectionHealth;
use crate::analytics::events::EventEmitter;
use crate::analytics::types::OutboundMessage;

/// What UI code needs from a realtime client.
///
/// Depend on this rather than a concrete client so views can be driven by a test double:
///
/// ```ignore
/// async fn refresh_badge(service: &dyn RealtimeService) -> &'static str {
///     if service.perform_health_check().await { "live" } else { "offline" }
/// }
/// ```
#[async_trait]
pub trait RealtimeService: Send + Sync {
    fn connect(&self, vendor_id: Option<&str>);

    /// Close the connection and release every registered listener.
    fn disconnect(&self);

    fn send(&self, message: OutboundMessage) -> Result<()>;

    fn is_connected(&self) -> bool;

    fn connection_state(&self) -> ConnectionState;

    /// Rolling average message latency in milliseconds.
    fn average_latency(&self) -> f64;

    fn connection_health(&self) -> ConnectionHealth;

    /// Probe the server and report whether anything came back in time.
    async fn perform_health_check(&self) -> bool;

    /// Listener registry for `on`/`off`.
    fn emitter(&self) -> &EventEmitter;
}
