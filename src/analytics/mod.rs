//! Vendor dashboard analytics over the realtime connection.
//!
//! - [`Client`]: the public entry point UI code holds
//! - [`MessageRouter`](router::MessageRouter): applies inbound frames to the [`AnalyticsStore`]
//! - [`EventEmitter`](events::EventEmitter): `on`/`off` callbacks and broadcast subscribers

pub mod client;
pub mod events;
pub mod router;
pub mod store;
pub mod types;

pub use client::{Client, ConnectionHealth};
pub use store::{AnalyticsStore, InMemoryStore};
