#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

/// Close code the server uses when the bearer token was rejected.
pub const CLOSE_AUTHENTICATION_FAILED: u16 = 4001;
/// Close code the server uses when no usable bearer token was presented.
pub const CLOSE_AUTHENTICATION_REQUIRED: u16 = 4003;
/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// Abnormal closure, used locally when the socket drops or the handshake fails.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// WebSocket error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// Error connecting to or communicating with the WebSocket server
    Connection(tokio_tungstenite::tungstenite::Error),
    /// Error parsing a WebSocket message
    MessageParse(serde_json::Error),
    /// Well-formed frame whose payload does not match its message type
    InvalidMessage(String),
    /// No bearer token could be obtained from the token source
    MissingToken,
    /// Server rejected the bearer token
    AuthenticationFailed,
    /// Server requires a bearer token
    AuthenticationRequired,
    /// WebSocket connection was closed
    ConnectionClosed,
    /// Operation timed out
    Timeout,
    /// Event stream lagged and missed messages
    Lagged {
        /// Number of messages that were missed
        count: u64,
    },
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "WebSocket connection error: {e}"),
            Self::MessageParse(e) => write!(f, "Failed to parse WebSocket message: {e}"),
            Self::InvalidMessage(msg) => write!(f, "Invalid WebSocket message: {msg}"),
            Self::MissingToken => write!(f, "No access token available"),
            Self::AuthenticationFailed => write!(f, "WebSocket authentication failed"),
            Self::AuthenticationRequired => write!(f, "WebSocket authentication required"),
            Self::ConnectionClosed => write!(f, "WebSocket connection closed"),
            Self::Timeout => write!(f, "WebSocket operation timed out"),
            Self::Lagged { count } => write!(f, "Event stream lagged, missed {count} messages"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            Self::MessageParse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WsError> for crate::error::Error {
    fn from(e: WsError) -> Self {
        let kind = match e {
            WsError::MissingToken
            | WsError::AuthenticationFailed
            | WsError::AuthenticationRequired => crate::error::Kind::Authentication,
            _ => crate::error::Kind::WebSocket,
        };
        crate::error::Error::with_source(kind, e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for crate::error::Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, WsError::Connection(e))
    }
}

/// How the connection task reacts to a close code.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Token rejected; surface to the UI, never retry
    AuthenticationFailed,
    /// Token missing; surface to the UI, never retry
    AuthenticationRequired,
    /// Normal closure; nothing to do
    Clean,
    /// Anything else; hand off to the reconnection policy
    Transient,
}

impl CloseDisposition {
    #[must_use]
    pub const fn classify(code: u16) -> Self {
        match code {
            CLOSE_AUTHENTICATION_FAILED => Self::AuthenticationFailed,
            CLOSE_AUTHENTICATION_REQUIRED => Self::AuthenticationRequired,
            CLOSE_NORMAL => Self::Clean,
            _ => Self::Transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Kind};

    #[test]
    fn classify_close_codes() {
        assert_eq!(
            CloseDisposition::classify(4001),
            CloseDisposition::AuthenticationFailed
        );
        assert_eq!(
            CloseDisposition::classify(4003),
            CloseDisposition::AuthenticationRequired
        );
        assert_eq!(CloseDisposition::classify(1000), CloseDisposition::Clean);
        assert_eq!(CloseDisposition::classify(1001), CloseDisposition::Transient);
        assert_eq!(CloseDisposition::classify(1006), CloseDisposition::Transient);
    }

    #[test]
    fn authentication_errors_map_to_authentication_kind() {
        let error: Error = WsError::MissingToken.into();
        assert_eq!(error.kind(), Kind::Authentication);

        let error: Error = WsError::Timeout.into();
        assert_eq!(error.kind(), Kind::WebSocket);
    }
}
