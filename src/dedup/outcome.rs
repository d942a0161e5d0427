use std::fmt;
use std::time::Duration;

use tracing::Level;
use tracing::event;

use crate::request_key::RequestKey;

/// How a caller took part in a coordinated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    /// Registered the entry and invoked the transport.
    Leader,
    /// Attached to an entry another caller registered.
    Follower,
    /// Ran without registering because the map was full.
    Bypass,
}

impl fmt::Display for CallRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallRole::Leader => write!(f, "leader"),
            CallRole::Follower => write!(f, "follower"),
            CallRole::Bypass => write!(f, "bypass"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub role: CallRole,
    pub success: bool,
    pub waited: Duration,
}

impl DedupOutcome {
    pub fn log(&self, key: &RequestKey) {
        event!(
            Level::DEBUG,
            key = %key,
            role = %self.role,
            success = self.success,
            waited_ms = self.waited.as_millis() as u64,
            "dedup.outcome"
        );
    }
}
