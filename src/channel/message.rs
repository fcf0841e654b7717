//! Wire messages exchanged on a transaction bus.
//!
//! Two record shapes exist on the wire:
//! - `{"transaction_window_ready": true}`: the result context is mounted and listening
//! - `{"status": "<string>"}`: a transaction status update
//!
//! Anything else is not a message of this protocol and decodes to `None`.

use serde_json::{json, Map, Value};

pub const READY_KEY: &str = "transaction_window_ready";
pub const STATUS_KEY: &str = "status";

/// A decoded bus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    /// Readiness announcement from the result context.
    Ready,
    /// Status update carrying an opaque payment-domain value.
    Status(String),
}

impl BusMessage {
    pub fn status(value: impl Into<String>) -> Self {
        BusMessage::Status(value.into())
    }

    pub fn encode(&self) -> Value {
        match self {
            BusMessage::Ready => json!({ READY_KEY: true }),
            BusMessage::Status(status) => json!({ STATUS_KEY: status }),
        }
    }

    /// Decode a raw record. A string `status` takes precedence over readiness.
    pub fn decode(raw: &Value) -> Option<Self> {
        let record = raw.as_object()?;
        if let Some(status) = string_field(record, STATUS_KEY) {
            return Some(BusMessage::Status(status.to_string()));
        }
        match record.get(READY_KEY) {
            Some(Value::Bool(true)) => Some(BusMessage::Ready),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BusMessage::Ready => "ready",
            BusMessage::Status(_) => "status",
        }
    }
}

fn string_field<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}
