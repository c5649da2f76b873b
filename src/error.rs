//! Crate-level error types.
//!
//! [`BookFeedError`] unifies every error source (configuration, WebSocket,
//! HTTP, JSON, connector lifecycle) behind a single enum so callers can
//! match on the variant they care about while still using the `?` operator
//! for easy propagation.

use std::time::Duration;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BookFeedError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum BookFeedError {
    /// A configuration value was present but could not be used.
    #[error("configuration error: {0}")]
    Config(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The REST bootstrap request failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The WebSocket handshake did not complete in time.
    #[error("websocket handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The session was closed locally while an operation was in flight.
    #[error("session closed")]
    SessionClosed,

    /// The venue closed the connection or the stream ended.
    #[error("connection closed by remote")]
    ConnectionClosed,

    /// A message from the venue did not have the expected shape.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A lifecycle operation was invoked in a state that does not allow it.
    #[error("cannot {operation} while connector is {state}")]
    InvalidState {
        operation: &'static str,
        state: crate::connector::ConnectorState,
    },
}
