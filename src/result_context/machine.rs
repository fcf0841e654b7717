//! Result-context state machine.
//!
//! Pure transitions; every side effect is returned as an [`Effect`] for the
//! driver to execute. Transitions happen only on mount, message arrival, and
//! grace-timer expiry.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::BusMessage;
use crate::status::{StatusStore, StoreUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// Mounted, readiness not yet sent.
    Starting,
    /// Readiness sent.
    Announced,
    /// Reflecting status updates until the terminal value arrives.
    Waiting,
    /// Terminal status latched; grace timer running.
    Finished,
    /// Grace period over; host close requested.
    Closing,
}

impl ControllerState {
    pub fn as_str(self) -> &'static str {
        match self {
            ControllerState::Starting => "starting",
            ControllerState::Announced => "announced",
            ControllerState::Waiting => "waiting",
            ControllerState::Finished => "finished",
            ControllerState::Closing => "closing",
        }
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Announce,
    ArmGraceTimer(Duration),
    RequestClose,
}

#[derive(Debug, Clone)]
pub struct ResultMachine {
    state: ControllerState,
    store: StatusStore,
    grace: Duration,
    announced: bool,
}

impl ResultMachine {
    pub fn new(terminal: impl Into<String>, grace: Duration) -> Self {
        Self {
            state: ControllerState::Starting,
            store: StatusStore::new(terminal),
            grace,
            announced: false,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    pub fn grace_period(&self) -> Duration {
        self.grace
    }

    /// Announce readiness. One-shot per machine: re-entrant mounts yield nothing.
    pub fn mount(&mut self) -> Option<Effect> {
        if self.announced {
            return None;
        }
        self.announced = true;
        if self.state == ControllerState::Starting {
            self.state = ControllerState::Announced;
        }
        Some(Effect::Announce)
    }

    /// Enter steady state once the announcement has gone out.
    pub fn settle(&mut self) {
        if self.state == ControllerState::Announced {
            self.state = ControllerState::Waiting;
        }
    }

    pub fn on_message(&mut self, message: &BusMessage) -> Option<Effect> {
        match self.store.apply(message) {
            StoreUpdate::Finished => {
                self.state = ControllerState::Finished;
                Some(Effect::ArmGraceTimer(self.grace))
            }
            StoreUpdate::Progress
            | StoreUpdate::AfterFinish
            | StoreUpdate::Readiness
            | StoreUpdate::Ignored => None,
        }
    }

    pub fn on_raw(&mut self, raw: &Value) -> Option<Effect> {
        let message = BusMessage::decode(raw)?;
        self.on_message(&message)
    }

    pub fn on_grace_elapsed(&mut self) -> Option<Effect> {
        if self.state != ControllerState::Finished {
            return None;
        }
        self.state = ControllerState::Closing;
        Some(Effect::RequestClose)
    }
}
