//! Initiator consumer: the primary context's read-only view of a transaction bus.
//!
//! Tracks the latest status, the finished latch, and whether readiness was
//! ever observed. It never closes the result context and never closes its own
//! channel because a transaction finished; its channel lives exactly as long
//! as the consumer does.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::channel::{Bus, ChannelHandle, ChannelName};
use crate::config::TransactionSettings;
use crate::host::SessionRefresher;
use crate::status::{StatusStore, StoreUpdate};

/// What downstream UI and session logic see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionView {
    pub status: Option<String>,
    pub finished: bool,
    pub ready_observed: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of a bounded wait for the terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WaitOutcome {
    Finished {
        status: String,
    },
    TimedOut {
        last_status: Option<String>,
        ready_observed: bool,
    },
    /// No channel to wait on: it could not be opened, or the consumer was closed.
    Unavailable,
}

pub struct InitiatorConsumer {
    channel: ChannelName,
    terminal: String,
    handle: Option<ChannelHandle>,
    view: watch::Receiver<TransactionView>,
}

impl InitiatorConsumer {
    /// Open the consumer on the attempt's channel.
    ///
    /// Readiness sent before this call is lost; the view then simply never
    /// reports `ready_observed`. An unavailable channel is logged and leaves
    /// the view permanently unfinished.
    pub fn open(bus: &Bus, settings: &TransactionSettings) -> Self {
        Self::build(bus, settings, None)
    }

    /// Like [`open`](Self::open), refreshing the session once the terminal status lands.
    pub fn with_refresher(
        bus: &Bus,
        settings: &TransactionSettings,
        refresher: Arc<dyn SessionRefresher>,
    ) -> Self {
        Self::build(bus, settings, Some(refresher))
    }

    fn build(
        bus: &Bus,
        settings: &TransactionSettings,
        refresher: Option<Arc<dyn SessionRefresher>>,
    ) -> Self {
        let (view_tx, view_rx) = watch::channel(TransactionView::default());
        let projector = Projector {
            store: StatusStore::new(settings.terminal_status.clone()),
            view: view_tx,
            refresher,
            channel: settings.channel.clone(),
        };
        let handle = open_projecting(bus, &settings.channel, projector);

        Self {
            channel: settings.channel.clone(),
            terminal: settings.terminal_status.clone(),
            handle,
            view: view_rx,
        }
    }

    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    pub fn is_connected(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_closed())
    }

    pub fn view(&self) -> TransactionView {
        self.view.borrow().clone()
    }

    pub fn status(&self) -> Option<String> {
        self.view.borrow().status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.view.borrow().finished
    }

    pub fn ready_observed(&self) -> bool {
        self.view.borrow().ready_observed
    }

    pub fn subscribe(&self) -> watch::Receiver<TransactionView> {
        self.view.clone()
    }

    /// Wait at most `timeout` for the terminal status.
    pub async fn wait_for_terminal(&self, timeout: Duration) -> WaitOutcome {
        if !self.is_connected() {
            return WaitOutcome::Unavailable;
        }
        let mut view = self.view.clone();
        let waited = tokio::time::timeout(timeout, view.wait_for(|v| v.finished)).await;
        match waited {
            // Later statuses may overwrite `view.status`; the latch only flips on the terminal value.
            Ok(Ok(_)) => WaitOutcome::Finished {
                status: self.terminal.clone(),
            },
            Ok(Err(_)) => WaitOutcome::Unavailable,
            Err(_) => {
                let current = self.view.borrow();
                info!(
                    channel = %self.channel,
                    last_status = ?current.status,
                    "no terminal status within wait bound"
                );
                WaitOutcome::TimedOut {
                    last_status: current.status.clone(),
                    ready_observed: current.ready_observed,
                }
            }
        }
    }

    /// Release the channel. Idempotent; also happens on drop.
    pub fn close(&self) {
        if let Some(handle) = &self.handle {
            handle.close();
        }
    }
}

fn open_projecting(
    bus: &Bus,
    channel: &ChannelName,
    mut projector: Projector,
) -> Option<ChannelHandle> {
    let handle = match ChannelHandle::open(bus, channel) {
        Ok(handle) => handle,
        Err(err) => {
            warn!(
                channel = %channel,
                error = %err,
                "transaction channel unavailable; status will not update"
            );
            return None;
        }
    };
    match handle.on_message(move |raw| projector.observe(&raw)) {
        Ok(()) => Some(handle),
        Err(err) => {
            warn!(channel = %channel, error = %err, "failed to listen on transaction channel");
            None
        }
    }
}

/// Lives inside the channel listener and owns the consumer's status store.
struct Projector {
    store: StatusStore,
    view: watch::Sender<TransactionView>,
    refresher: Option<Arc<dyn SessionRefresher>>,
    channel: ChannelName,
}

impl Projector {
    fn observe(&mut self, raw: &Value) {
        match self.store.apply_raw(raw) {
            StoreUpdate::Readiness => {
                let first = self.view.send_if_modified(|view| {
                    if view.ready_observed {
                        return false;
                    }
                    view.ready_observed = true;
                    view.updated_at = Some(Utc::now());
                    true
                });
                if first {
                    debug!(channel = %self.channel, "result context readiness observed");
                }
            }
            StoreUpdate::Ignored => {}
            update @ (StoreUpdate::Progress | StoreUpdate::Finished | StoreUpdate::AfterFinish) => {
                let snapshot = self.store.snapshot();
                self.view.send_modify(|view| {
                    view.status = snapshot.status.clone();
                    view.finished = snapshot.finished;
                    view.updated_at = Some(Utc::now());
                });
                if update == StoreUpdate::Finished {
                    info!(
                        channel = %self.channel,
                        status = ?snapshot.status,
                        "transaction finished"
                    );
                    self.refresh_session();
                }
            }
        }
    }

    fn refresh_session(&self) {
        let Some(refresher) = self.refresher.clone() else {
            return;
        };
        let status = self.store.terminal().to_string();
        let channel = self.channel.clone();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(channel = %channel, "no async runtime; skipping session refresh");
            return;
        };
        runtime.spawn(async move {
            if let Err(err) = refresher.refresh(&status).await {
                warn!(channel = %channel, error = %err, "session refresh failed");
            }
        });
    }
}
