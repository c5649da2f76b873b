//! Inbound message classification.
//!
//! Decoding runs in two passes: the raw text is parsed into an untyped
//! JSON tree, then its shape picks the typed variant. Objects with a
//! non-empty `event` are control messages; `[chanId, payload]` arrays are
//! data. Anything else is ignored rather than treated as an error.

use serde_json::Value;
use tracing::trace;

use crate::models::EventMessage;
use crate::models::book::BookRecord;

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Control(ControlMessage),
    Data { chan_id: u64, payload: DataPayload },
    Ignored,
}

/// Control/event messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    Subscribed {
        chan_id: u64,
        channel: Option<String>,
        symbol: Option<String>,
    },
    Info {
        code: Option<i64>,
        msg: Option<String>,
        version: Option<u64>,
    },
    Error {
        code: Option<i64>,
        msg: String,
    },
    /// Any other event kind (`pong`, `conf`, `unsubscribed`, ...).
    Other(String),
}

impl From<EventMessage> for ControlMessage {
    fn from(msg: EventMessage) -> Self {
        match msg.event.as_str() {
            "subscribed" => match msg.chan_id {
                Some(chan_id) => ControlMessage::Subscribed {
                    chan_id,
                    channel: msg.channel,
                    symbol: msg.symbol,
                },
                // Without a channel id there is nothing to bind.
                None => ControlMessage::Other(msg.event),
            },
            "info" => ControlMessage::Info {
                code: msg.code,
                msg: msg.msg,
                version: msg.version,
            },
            "error" => ControlMessage::Error {
                code: msg.code,
                msg: msg.msg.unwrap_or_default(),
            },
            _ => ControlMessage::Other(msg.event),
        }
    }
}

/// Payload of a data message.
#[derive(Debug, Clone, PartialEq)]
pub enum DataPayload {
    /// Full book; invalid entries have already been dropped.
    Snapshot(Vec<BookRecord>),
    Delta(BookRecord),
    /// `[chanId, "hb"]`
    Heartbeat,
    /// A single record that failed validation.
    Rejected(String),
    Unrecognized,
}

impl DataPayload {
    fn from_value(payload: &Value) -> Self {
        match payload {
            Value::String(s) if s == "hb" => DataPayload::Heartbeat,
            Value::Array(entries) if entries.first().is_some_and(Value::is_array) => {
                let records = entries
                    .iter()
                    .filter_map(|entry| match BookRecord::from_value(entry) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            trace!(error = %e, "Dropping snapshot entry");
                            None
                        }
                    })
                    .collect();
                DataPayload::Snapshot(records)
            }
            Value::Array(entries) if !entries.is_empty() => match BookRecord::from_value(payload) {
                Ok(record) => DataPayload::Delta(record),
                Err(e) => DataPayload::Rejected(e.to_string()),
            },
            _ => DataPayload::Unrecognized,
        }
    }
}

/// Decodes one raw message without any subscription context.
#[must_use]
pub fn decode(text: &str) -> Inbound {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Inbound::Ignored;
    };

    match value {
        Value::Object(_) => match serde_json::from_value::<EventMessage>(value) {
            Ok(msg) if !msg.event.is_empty() => Inbound::Control(msg.into()),
            _ => Inbound::Ignored,
        },
        Value::Array(items) if items.len() >= 2 => match items[0].as_u64() {
            Some(chan_id) => Inbound::Data {
                chan_id,
                payload: DataPayload::from_value(&items[1]),
            },
            None => Inbound::Ignored,
        },
        _ => Inbound::Ignored,
    }
}

/// Decoder that tracks the channel id bound by the last `subscribed` event.
///
/// Data for any other channel, including everything that arrives before
/// the first binding, is classified as [`Inbound::Ignored`].
#[derive(Debug, Default)]
pub struct Classifier {
    bound: Option<u64>,
}

impl Classifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bound_channel(&self) -> Option<u64> {
        self.bound
    }

    pub fn classify(&mut self, text: &str) -> Inbound {
        match decode(text) {
            Inbound::Control(ControlMessage::Subscribed { chan_id, channel, symbol }) => {
                self.bound = Some(chan_id);
                Inbound::Control(ControlMessage::Subscribed {
                    chan_id,
                    channel,
                    symbol,
                })
            }
            Inbound::Data { chan_id, .. } if self.bound != Some(chan_id) => {
                trace!(chan_id, bound = ?self.bound, "Discarding data for unbound channel");
                Inbound::Ignored
            }
            other => other,
        }
    }
}
