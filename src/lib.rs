//! txn-signal: cross-context transaction completion signal
//!
//! Two independently running contexts (the initiator that started a
//! transaction and the result context that hosts its outcome) coordinate over
//! a named in-process broadcast bus. The result context announces readiness,
//! reflects status updates, and asks its host to close after a grace period
//! once the terminal status arrives. The initiator observes the same status
//! stream read-only and learns when the transaction finished.

pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod initiator;
pub mod logging;
pub mod result_context;
pub mod simulation;
pub mod status;

pub use channel::{Bus, BusMessage, ChannelHandle, ChannelName};
pub use config::{SignalConfig, TransactionSettings};
pub use error::{ChannelError, SignalError};
pub use host::{HostWindow, SessionRefresher};
pub use initiator::{InitiatorConsumer, TransactionView, WaitOutcome};
pub use result_context::{ControllerState, ResultContext, ResultView};
pub use status::{StatusStore, StoreUpdate};
