//! Channel domain: the named bus, owned handles, wire messages, and names.

pub mod bus;
pub mod handle;
pub mod message;
pub mod name;

pub use bus::{Bus, DEFAULT_CAPACITY};
pub use handle::{ChannelHandle, MessageCallback};
pub use message::BusMessage;
pub use name::ChannelName;
