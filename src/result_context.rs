//! Result context: runs inside the secondary (transaction) context.
//!
//! Announces readiness once, reflects status updates, and asks its host to
//! close after the grace period that follows the terminal status. The channel
//! handle and the grace timer are owned by the context and released on
//! unmount, whichever state it is in.

pub mod machine;

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::ReentrantMutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::channel::{Bus, BusMessage, ChannelHandle, ChannelName};
use crate::config::TransactionSettings;
use crate::host::HostWindow;

pub use machine::{ControllerState, Effect, ResultMachine};

/// Observable state of a result context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultView {
    pub state: ControllerState,
    pub status: Option<String>,
    pub finished: bool,
    pub channel_available: bool,
}

/// Set on unmount. The close request is issued while holding it, so an
/// unmount either waits for an in-flight request or suppresses it. Reentrant
/// because a host may drop the context from inside `request_close`.
type UnmountFlag = Arc<ReentrantMutex<Cell<bool>>>;

enum DriverEvent {
    Bus(Value),
    Local(BusMessage),
    Rerender,
}

pub struct ResultContext {
    channel: ChannelName,
    handle: Option<Arc<ChannelHandle>>,
    events: mpsc::UnboundedSender<DriverEvent>,
    view: watch::Receiver<ResultView>,
    unmounted: UnmountFlag,
    task: Option<JoinHandle<()>>,
}

impl ResultContext {
    /// Mount the controller: open the channel, listen, announce readiness.
    ///
    /// A channel that cannot be opened is logged and the context stays in
    /// `Starting`; mounting itself never fails.
    pub fn mount(bus: &Bus, settings: &TransactionSettings, host: Arc<dyn HostWindow>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = open_listening(bus, &settings.channel, events_tx.clone());
        let channel_available = handle.is_some();

        let machine = ResultMachine::new(settings.terminal_status.clone(), settings.grace_period);
        let (view_tx, view_rx) = watch::channel(ResultView {
            state: machine.state(),
            status: None,
            finished: false,
            channel_available,
        });
        let unmounted: UnmountFlag = Arc::new(ReentrantMutex::new(Cell::new(false)));

        let driver = Driver {
            machine,
            handle: handle.clone(),
            host,
            view: view_tx,
            unmounted: Arc::clone(&unmounted),
            channel: settings.channel.clone(),
        };
        let task = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(driver.run(events_rx))),
            Err(_) => {
                warn!(channel = %settings.channel, "no async runtime; result context is inert");
                None
            }
        };

        Self {
            channel: settings.channel.clone(),
            handle,
            events: events_tx,
            view: view_rx,
            unmounted,
            task,
        }
    }

    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    pub fn is_channel_available(&self) -> bool {
        self.handle.is_some()
    }

    pub fn view(&self) -> ResultView {
        self.view.borrow().clone()
    }

    pub fn state(&self) -> ControllerState {
        self.view.borrow().state
    }

    pub fn status(&self) -> Option<String> {
        self.view.borrow().status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.view.borrow().finished
    }

    pub fn subscribe(&self) -> watch::Receiver<ResultView> {
        self.view.clone()
    }

    /// Wait until the view satisfies `predicate`. `None` if the driver stopped first.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Option<ResultView>
    where
        F: FnMut(&ResultView) -> bool,
    {
        let mut view = self.view.clone();
        let result = view.wait_for(|v| predicate(v)).await;
        result.ok().map(|v| v.clone())
    }

    /// Re-entrant mount (a re-render). Never resends readiness.
    pub fn rerender(&self) {
        let _ = self.events.send(DriverEvent::Rerender);
    }

    /// A status observed inside this context: broadcast it and apply it locally.
    ///
    /// Without a channel the synchronisation feature is off and this is a no-op.
    pub fn report_status(&self, status: impl Into<String>) {
        let Some(handle) = &self.handle else {
            debug!(channel = %self.channel, "no channel; status report dropped");
            return;
        };
        let message = BusMessage::Status(status.into());
        handle.send(&message);
        let _ = self.events.send(DriverEvent::Local(message));
    }

    /// Tear the context down: cancel the grace timer and release the channel.
    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for ResultContext {
    fn drop(&mut self) {
        self.unmounted.lock().set(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(handle) = &self.handle {
            handle.close();
        }
        debug!(channel = %self.channel, "result context unmounted");
    }
}

fn open_listening(
    bus: &Bus,
    channel: &ChannelName,
    events: mpsc::UnboundedSender<DriverEvent>,
) -> Option<Arc<ChannelHandle>> {
    let handle = match ChannelHandle::open(bus, channel) {
        Ok(handle) => handle,
        Err(err) => {
            warn!(
                channel = %channel,
                error = %err,
                "transaction channel unavailable; result context will not synchronise"
            );
            return None;
        }
    };
    let listening = handle.on_message(move |raw| {
        let _ = events.send(DriverEvent::Bus(raw));
    });
    match listening {
        Ok(()) => Some(Arc::new(handle)),
        Err(err) => {
            warn!(channel = %channel, error = %err, "failed to listen on transaction channel");
            None
        }
    }
}

struct Driver {
    machine: ResultMachine,
    handle: Option<Arc<ChannelHandle>>,
    host: Arc<dyn HostWindow>,
    view: watch::Sender<ResultView>,
    unmounted: UnmountFlag,
    channel: ChannelName,
}

impl Driver {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<DriverEvent>) {
        let grace = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(grace);
        let mut armed = false;

        if let Some(period) = self.mount() {
            grace.as_mut().reset(Instant::now() + period);
            armed = true;
        }

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if let Some(period) = self.handle_event(event) {
                        grace.as_mut().reset(Instant::now() + period);
                        armed = true;
                    }
                }
                () = &mut grace, if armed => {
                    armed = false;
                    if let Some(effect) = self.machine.on_grace_elapsed() {
                        self.execute(effect);
                    }
                    self.publish();
                }
            }
        }
        trace!(channel = %self.channel, "result context driver stopped");
    }

    fn mount(&mut self) -> Option<Duration> {
        if self.handle.is_none() {
            return None;
        }
        let armed = self.machine.mount().and_then(|effect| self.execute(effect));
        self.machine.settle();
        self.publish();
        armed
    }

    fn handle_event(&mut self, event: DriverEvent) -> Option<Duration> {
        let effect = match event {
            DriverEvent::Bus(raw) => self.machine.on_raw(&raw),
            DriverEvent::Local(message) => self.machine.on_message(&message),
            DriverEvent::Rerender => return self.mount(),
        };
        let armed = effect.and_then(|effect| self.execute(effect));
        self.publish();
        armed
    }

    /// Returns the grace period to arm, if any.
    fn execute(&mut self, effect: Effect) -> Option<Duration> {
        match effect {
            Effect::Announce => {
                if let Some(handle) = &self.handle {
                    handle.send(&BusMessage::Ready);
                    debug!(channel = %self.channel, "readiness announced");
                }
                None
            }
            Effect::ArmGraceTimer(period) => {
                info!(
                    channel = %self.channel,
                    grace_ms = period.as_millis() as u64,
                    "terminal status received; closing after grace period"
                );
                Some(period)
            }
            Effect::RequestClose => {
                let unmounted = self.unmounted.lock();
                if unmounted.get() {
                    debug!(channel = %self.channel, "context unmounted; skipping close request");
                    return None;
                }
                info!(channel = %self.channel, "requesting host close");
                self.host.request_close();
                None
            }
        }
    }

    fn publish(&self) {
        let store = self.machine.store();
        self.view.send_replace(ResultView {
            state: self.machine.state(),
            status: store.status().map(str::to_string),
            finished: store.is_finished(),
            channel_available: self.handle.is_some(),
        });
    }
}
