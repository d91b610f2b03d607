//! Core WebSocket infrastructure.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: connection task handle with heartbeat, reconnection and queueing
//! - [`ReconnectBackoff`](backoff::ReconnectBackoff): retry delays with jitter and an attempt cap
//! - [`OutboundQueue`](queue::OutboundQueue): bounded FIFO of messages sent while disconnected
//! - [`LatencyTracker`](latency::LatencyTracker): rolling window of message latencies
//! - [`RealtimeService`]: capability trait UI code depends on

pub mod backoff;
pub mod config;
pub mod connection;
pub mod error;
pub mod latency;
pub mod queue;
pub mod traits;

pub use connection::{ConnectionManager, ConnectionState};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use traits::*;
