//! Models for Bitfinex WebSocket V2 messages.
//!
//! Contains the subscription request, the control/event envelope, and the
//! canonical book records in [`book`].

pub mod book;

use serde::{Deserialize, Serialize};

/// Public channels this crate subscribes to.
pub enum Channel {
    Book,
}

impl Channel {
    /// Returns the wire-format channel name expected by the Bitfinex API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Book => "book",
        }
    }
}

/// A `subscribe` request sent to the Bitfinex WebSocket API.
///
/// Serializes as
/// `{"event":"subscribe","channel":"book","symbol":"tBTCUSD","prec":"P0","freq":"F0","len":"100"}`.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    pub event: String,
    pub channel: String,
    pub symbol: String,
    pub prec: String,
    pub freq: String,
    pub len: String,
}

impl SubscribeRequest {
    /// Builds a book subscription for a wire symbol.
    #[must_use]
    pub fn book(symbol: &str, precision: &str, frequency: &str, length: &str) -> Self {
        Self {
            event: "subscribe".to_string(),
            channel: Channel::Book.as_str().to_string(),
            symbol: symbol.to_string(),
            prec: precision.to_string(),
            freq: frequency.to_string(),
            len: length.to_string(),
        }
    }
}

/// Control envelope: any JSON object carrying an `event` field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventMessage {
    pub event: String,
    pub code: Option<i64>,
    pub msg: Option<String>,
    pub channel: Option<String>,
    #[serde(rename = "chanId")]
    pub chan_id: Option<u64>,
    pub symbol: Option<String>,
    pub pair: Option<String>,
    pub prec: Option<String>,
    pub freq: Option<String>,
    pub len: Option<String>,
    pub version: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_request_matches_wire_format() {
        let request = SubscribeRequest::book("tBTCUSD", "P0", "F0", "100");
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(
            json,
            r#"{"event":"subscribe","channel":"book","symbol":"tBTCUSD","prec":"P0","freq":"F0","len":"100"}"#
        );
    }

    #[test]
    fn event_message_ignores_unknown_fields() {
        let msg: EventMessage = serde_json::from_str(
            r#"{"event":"info","version":2,"serverId":"abc","platform":{"status":1}}"#,
        )
        .unwrap();
        assert_eq!(msg.event, "info");
        assert_eq!(msg.version, Some(2));
        assert!(msg.chan_id.is_none());
    }
}
