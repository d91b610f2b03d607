//! Re-exported types from external crates for convenience.
//!
//! These types are commonly used in this crate and are re-exported here
//! so users don't need to add these dependencies to their `Cargo.toml`.

/// Date and time types for message timestamps.
pub use chrono::{DateTime, Utc};
/// Arbitrary precision decimal type for order amounts (COP).
pub use rust_decimal::Decimal;
/// Macro for creating [`Decimal`] literals at compile time.
///
/// # Example
/// ```
/// use marketplace_realtime::types::dec;
/// let amount = dec!(50000);
/// ```
pub use rust_decimal_macros::dec;
/// JSON object type used for free-form metric payloads.
pub type Map = serde_json::Map<String, serde_json::Value>;
