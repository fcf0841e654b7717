//! Collaborator seams at the edge of the core.
//!
//! `HostWindow` is the browsing context the result controller lives in; the
//! only thing the core ever asks of it is to close itself. `SessionRefresher`
//! is the initiator's session layer, poked once when a transaction finishes.

use async_trait::async_trait;

use crate::error::SignalError;

/// The context hosting a result controller.
///
/// `request_close` is best effort: a host that was not opened in a way that
/// permits script-initiated close may ignore it.
pub trait HostWindow: Send + Sync {
    fn request_close(&self);
}

impl<F> HostWindow for F
where
    F: Fn() + Send + Sync,
{
    fn request_close(&self) {
        self()
    }
}

/// Session/auth layer refreshed after a terminal status (balance, entitlements).
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    async fn refresh(&self, terminal_status: &str) -> Result<(), SignalError>;
}
