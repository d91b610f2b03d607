#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod analytics;
pub mod auth;
pub mod error;
pub mod types;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Path of the analytics channel on the marketplace API host.
pub const ANALYTICS_PATH: &str = "/ws/analytics";

/// Environment variable holding the WebSocket base URL, e.g. `wss://api.example.co`.
pub const WS_BASE_URL_VAR: &str = "MARKETPLACE_WS_URL";

/// Analytics endpoint for a WebSocket base URL.
///
/// ```
/// assert_eq!(
///     marketplace_realtime::analytics_endpoint("wss://api.example.co/"),
///     "wss://api.example.co/ws/analytics"
/// );
/// ```
#[must_use]
pub fn analytics_endpoint(base_url: &str) -> String {
    format!("{}{ANALYTICS_PATH}", base_url.trim_end_matches('/'))
}
