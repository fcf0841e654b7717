//! Channel identity: validated bus names and per-attempt name generation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::SignalError;

const MAX_NAME_LEN: usize = 128;

static ATTEMPT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Name of a bus topic. Both contexts of one attempt must use the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new(name: impl Into<String>) -> Result<Self, SignalError> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// Fresh name for one transaction attempt: `<prefix>-<unix-millis>-<pid>-<seq>`.
    pub fn for_attempt(prefix: &str) -> Result<Self, SignalError> {
        let seq = ATTEMPT_COUNTER.fetch_add(1, Ordering::Relaxed);
        let pid = std::process::id();
        Self::new(format!("{prefix}-{}-{pid}-{seq}", now_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate(name: &str) -> Result<(), SignalError> {
    if name.is_empty() {
        return Err(SignalError::InvalidChannelName(
            "name cannot be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(SignalError::InvalidChannelName(format!(
            "name exceeds {} bytes: {}",
            MAX_NAME_LEN,
            name.len()
        )));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(SignalError::InvalidChannelName(format!(
            "name contains whitespace or control characters: {:?}",
            name
        )));
    }
    Ok(())
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl TryFrom<String> for ChannelName {
    type Error = SignalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelName> for String {
    fn from(name: ChannelName) -> Self {
        name.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
