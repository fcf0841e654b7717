//! Shared helpers for integration tests
//!
//! Provides a host that counts close requests, per-test settings, and a bounded
//! wait on watch-based views so a broken test fails instead of hanging.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::watch;
use txn_signal::channel::ChannelName;
use txn_signal::config::TransactionSettings;
use txn_signal::host::HostWindow;

pub const PAID: &str = "payment.paid";
pub const PENDING: &str = "payment.pending";

/// Upper bound for any single wait in these tests.
pub const WAIT_LIMIT: Duration = Duration::from_secs(10);

/// Host that records how many times it was asked to close.
#[derive(Clone, Default)]
pub struct RecordingHost {
    closes: Arc<AtomicUsize>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn as_host(&self) -> Arc<dyn HostWindow> {
        Arc::new(self.clone())
    }
}

impl HostWindow for RecordingHost {
    fn request_close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn settings(channel: &str) -> TransactionSettings {
    TransactionSettings::new(ChannelName::new(channel).unwrap(), PAID)
}

/// Wait until `predicate` holds on the view, panicking after [`WAIT_LIMIT`].
pub async fn wait_until<T, F>(view: &watch::Receiver<T>, what: &str, predicate: F) -> T
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    let mut view = view.clone();
    let waited = tokio::time::timeout(WAIT_LIMIT, view.wait_for(predicate)).await;
    match waited {
        Ok(Ok(value)) => value.clone(),
        Ok(Err(_)) => panic!("view closed while waiting for {what}"),
        Err(_) => panic!("timed out waiting for {what}"),
    }
}

static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Run `f` with XDG_CONFIG_HOME pointed into `test_dir` and TXN_SIGNAL_* overrides cleared.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let keys = [
        "XDG_CONFIG_HOME",
        "TXN_SIGNAL_ENV",
        "TXN_SIGNAL__BUS__CAPACITY",
        "TXN_SIGNAL__TRANSACTION__GRACE_PERIOD_MS",
    ];
    let saved: Vec<(&str, Option<String>)> = keys
        .iter()
        .map(|key| (*key, std::env::var(key).ok()))
        .collect();

    std::env::set_var("XDG_CONFIG_HOME", test_dir.path().join("xdg"));
    for key in &keys[1..] {
        std::env::remove_var(key);
    }

    let result = f();

    for (key, value) in saved {
        match value {
            Some(v) => std::env::set_var(key, v),
            None => std::env::remove_var(key),
        }
    }
    result
}
