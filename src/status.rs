//! Status store: projects bus messages onto `{status, finished}`.
//!
//! `finished` is a one-way latch that flips only when a status equal to the
//! configured terminal value arrives. Readiness never touches either field; it
//! is reported back to the caller so the initiator can track it separately.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::channel::BusMessage;

/// What applying one message did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreUpdate {
    /// Non-terminal status recorded before the latch.
    Progress,
    /// Terminal status recorded; the latch flipped on this message.
    Finished,
    /// Status recorded after the latch had already flipped.
    AfterFinish,
    /// Readiness announcement; the store is unchanged.
    Readiness,
    /// Record was not a protocol message; the store is unchanged.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: Option<String>,
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct StatusStore {
    terminal: String,
    status: Option<String>,
    finished: bool,
}

impl StatusStore {
    pub fn new(terminal: impl Into<String>) -> Self {
        Self {
            terminal: terminal.into(),
            status: None,
            finished: false,
        }
    }

    pub fn terminal(&self) -> &str {
        &self.terminal
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status.clone(),
            finished: self.finished,
        }
    }

    pub fn apply(&mut self, message: &BusMessage) -> StoreUpdate {
        match message {
            BusMessage::Ready => StoreUpdate::Readiness,
            BusMessage::Status(value) => self.record_status(value),
        }
    }

    /// Decode and apply a raw bus record.
    pub fn apply_raw(&mut self, raw: &Value) -> StoreUpdate {
        match BusMessage::decode(raw) {
            Some(message) => self.apply(&message),
            None => {
                debug!(record = %raw, "ignoring non-protocol bus record");
                StoreUpdate::Ignored
            }
        }
    }

    fn record_status(&mut self, value: &str) -> StoreUpdate {
        self.status = Some(value.to_string());
        if self.finished {
            return StoreUpdate::AfterFinish;
        }
        if value == self.terminal {
            self.finished = true;
            StoreUpdate::Finished
        } else {
            StoreUpdate::Progress
        }
    }
}
