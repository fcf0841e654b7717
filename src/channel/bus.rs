//! In-process named broadcast bus.
//!
//! Each topic is a bounded `tokio::sync::broadcast` ring. Delivery is best
//! effort: listeners that attach late never see earlier messages, and a
//! listener that falls more than `capacity` messages behind loses the excess.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::channel::name::ChannelName;
use crate::error::ChannelError;

/// Default number of messages buffered per topic.
pub const DEFAULT_CAPACITY: usize = 64;

static SHARED_BUS: OnceLock<Bus> = OnceLock::new();

/// A message as it travels on a topic, tagged with the sending handle.
#[derive(Debug, Clone)]
pub(crate) struct Envelope {
    pub origin: u64,
    pub payload: Value,
}

struct Topic {
    sender: broadcast::Sender<Envelope>,
    handles: usize,
}

struct BusInner {
    topics: RwLock<HashMap<String, Topic>>,
    capacity: usize,
    supported: bool,
    next_handle_id: AtomicU64,
}

/// Registry of named topics shared by every context that holds a clone.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

/// Attachment to one topic, released through [`Bus::release`].
pub(crate) struct Attachment {
    pub id: u64,
    pub sender: broadcast::Sender<Envelope>,
}

impl Bus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(capacity.max(1), true)
    }

    /// A bus on which every `open` fails, as on a platform without the primitive.
    pub fn unsupported() -> Self {
        Self::build(1, false)
    }

    /// Process-wide bus.
    pub fn shared() -> Bus {
        SHARED_BUS.get_or_init(Bus::new).clone()
    }

    fn build(capacity: usize, supported: bool) -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: RwLock::new(HashMap::new()),
                capacity,
                supported,
                next_handle_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn is_supported(&self) -> bool {
        self.inner.supported
    }

    /// Number of open handles on a topic.
    pub fn handle_count(&self, name: &ChannelName) -> usize {
        self.inner
            .topics
            .read()
            .get(name.as_str())
            .map(|topic| topic.handles)
            .unwrap_or(0)
    }

    /// Number of active listeners on a topic.
    pub fn listener_count(&self, name: &ChannelName) -> usize {
        self.inner
            .topics
            .read()
            .get(name.as_str())
            .map(|topic| topic.sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn topic_count(&self) -> usize {
        self.inner.topics.read().len()
    }

    pub(crate) fn attach(&self, name: &ChannelName) -> Result<Attachment, ChannelError> {
        if !self.inner.supported {
            return Err(ChannelError::Unavailable(format!(
                "bus primitive not supported in this context (channel {})",
                name
            )));
        }
        let id = self.inner.next_handle_id.fetch_add(1, Ordering::Relaxed);
        let mut topics = self.inner.topics.write();
        let topic = topics.entry(name.as_str().to_string()).or_insert_with(|| {
            debug!(channel = %name, "creating bus topic");
            let (sender, _) = broadcast::channel(self.inner.capacity);
            Topic { sender, handles: 0 }
        });
        topic.handles += 1;
        Ok(Attachment {
            id,
            sender: topic.sender.clone(),
        })
    }

    pub(crate) fn release(&self, name: &ChannelName) {
        let mut topics = self.inner.topics.write();
        let Some(topic) = topics.get_mut(name.as_str()) else {
            return;
        };
        topic.handles = topic.handles.saturating_sub(1);
        if topic.handles == 0 {
            topics.remove(name.as_str());
            debug!(channel = %name, "bus topic released");
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("capacity", &self.inner.capacity)
            .field("supported", &self.inner.supported)
            .field("topics", &self.topic_count())
            .finish()
    }
}
