//! Channel handle: one owned attachment to a named bus topic.
//!
//! A handle is the only way a context touches the bus. It sends fire-and-forget
//! records, has at most one active listener, and releases its subscription on
//! `close` or drop. A handle never receives the records it sent itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::channel::bus::{Bus, Envelope};
use crate::channel::message::BusMessage;
use crate::channel::name::ChannelName;
use crate::error::ChannelError;

/// Listener callback. Receives raw records in platform delivery order.
pub type MessageCallback = Box<dyn FnMut(Value) + Send + 'static>;

type CallbackSlot = Arc<Slot>;

#[derive(Default)]
struct SlotState {
    callback: Option<MessageCallback>,
    detached: bool,
    /// Thread currently running the callback, if any.
    running_on: Option<ThreadId>,
}

/// Holds the callback between invocations. It is taken out while it runs, so
/// the lock is never held across user code.
struct Slot {
    state: Mutex<SlotState>,
    idle: Condvar,
}

impl Slot {
    fn new(callback: MessageCallback) -> Self {
        Self {
            state: Mutex::new(SlotState {
                callback: Some(callback),
                ..SlotState::default()
            }),
            idle: Condvar::new(),
        }
    }
}

struct Listener {
    slot: CallbackSlot,
    task: JoinHandle<()>,
}

impl Listener {
    /// Waits out a callback running on another thread, so no invocation can
    /// start or still be running after this returns. Called from inside the
    /// callback itself it returns at once; that invocation is the last one.
    fn detach(self) {
        let mut state = self.slot.state.lock();
        state.detached = true;
        let callback = state.callback.take();
        let me = thread::current().id();
        while let Some(running) = state.running_on {
            if running == me {
                break;
            }
            self.slot.idle.wait(&mut state);
        }
        drop(state);
        drop(callback);
        self.task.abort();
    }
}

/// An owned attachment to one bus topic: send, listen, close.
pub struct ChannelHandle {
    bus: Bus,
    name: ChannelName,
    id: u64,
    sender: broadcast::Sender<Envelope>,
    listener: Mutex<Option<Listener>>,
    closed: AtomicBool,
}

impl ChannelHandle {
    /// Open a handle on `name`.
    ///
    /// Fails with [`ChannelError::Unavailable`] when the bus is unsupported or
    /// when there is no async runtime to deliver messages on.
    pub fn open(bus: &Bus, name: &ChannelName) -> Result<Self, ChannelError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ChannelError::Unavailable(format!(
                "no async runtime available for channel {}",
                name
            )));
        }
        let attachment = bus.attach(name)?;
        debug!(channel = %name, handle = attachment.id, "channel handle opened");
        Ok(Self {
            bus: bus.clone(),
            name: name.clone(),
            id: attachment.id,
            sender: attachment.sender,
            listener: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().is_some()
    }

    pub fn send(&self, message: &BusMessage) {
        trace!(channel = %self.name, kind = message.kind(), "sending message");
        self.send_raw(message.encode());
    }

    /// Post an arbitrary record. No acknowledgement, no delivery guarantee.
    pub fn send_raw(&self, payload: Value) {
        if self.is_closed() {
            debug!(channel = %self.name, "dropping message on closed channel");
            return;
        }
        let envelope = Envelope {
            origin: self.id,
            payload,
        };
        // Err only means nobody is listening right now; the record is lost.
        if self.sender.send(envelope).is_err() {
            trace!(channel = %self.name, "no listeners attached; message dropped");
        }
    }

    /// Register the listener for this handle, replacing any previous one.
    pub fn on_message<F>(&self, callback: F) -> Result<(), ChannelError>
    where
        F: FnMut(Value) + Send + 'static,
    {
        let mut listener = self.listener.lock();
        if self.is_closed() {
            return Err(ChannelError::Closed(self.name.to_string()));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ChannelError::Unavailable(format!(
                "no async runtime available for channel {}",
                self.name
            ))
        })?;

        let callback: MessageCallback = Box::new(callback);
        let slot: CallbackSlot = Arc::new(Slot::new(callback));
        let receiver = self.sender.subscribe();
        let task = runtime.spawn(deliver(
            receiver,
            Arc::clone(&slot),
            self.id,
            self.name.clone(),
        ));

        let previous = listener.replace(Listener { slot, task });
        drop(listener);
        if let Some(previous) = previous {
            debug!(channel = %self.name, "replacing channel listener");
            previous.detach();
        }
        Ok(())
    }

    /// Release the subscription and the bus attachment. Idempotent.
    pub fn close(&self) {
        let mut listener = self.listener.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let active = listener.take();
        drop(listener);
        if let Some(active) = active {
            active.detach();
        }
        self.bus.release(&self.name);
        debug!(channel = %self.name, handle = self.id, "channel handle closed");
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn deliver(
    mut receiver: broadcast::Receiver<Envelope>,
    slot: CallbackSlot,
    own_id: u64,
    name: ChannelName,
) {
    loop {
        match receiver.recv().await {
            Ok(envelope) => {
                if envelope.origin == own_id {
                    continue;
                }
                if !dispatch(&slot, envelope.payload) {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(channel = %name, skipped, "listener lagged behind bus; messages lost");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Returns false once the listener has been detached.
fn dispatch(slot: &Slot, payload: Value) -> bool {
    let mut callback = {
        let mut state = slot.state.lock();
        if state.detached {
            return false;
        }
        let Some(callback) = state.callback.take() else {
            return false;
        };
        state.running_on = Some(thread::current().id());
        callback
    };

    callback(payload);

    let mut state = slot.state.lock();
    state.running_on = None;
    let attached = !state.detached;
    if attached {
        state.callback = Some(callback);
    }
    drop(state);
    slot.idle.notify_all();
    attached
}
