//! Connection state machine.
//!
//! # States
//! - Disconnected: no session; initial state and terminal state after shutdown
//! - Connecting: bind in progress
//! - Connected: live authenticated session
//! - Failed: last attempt failed; either about to reconnect or terminal
//! - Reconnecting: backoff timer armed
//!
//! # State Transitions
//! ```text
//! Disconnected → Connecting: open requested
//! Connecting   → Connected: bind succeeded
//! Connecting   → Failed: bind failed (classified)
//! Connected    → Failed: operation or health probe failed (classified)
//! Failed       → Reconnecting: Transient, retries left
//! Failed       → Connecting: explicit restart of a terminated cycle
//! Reconnecting → Connecting: backoff timer elapsed
//! any          → Disconnected: shutdown
//! ```

use serde::Serialize;
use std::fmt;

/// Current state of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }

    /// Whether `self → next` is one of the defined transitions.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Failed)
                | (Connected, Failed)
                | (Failed, Reconnecting)
                | (Failed, Connecting)
                | (Reconnecting, Connecting)
                | (Connecting | Connected | Failed | Reconnecting, Disconnected)
        )
    }

    /// Gauge value exported through metrics.
    pub fn as_metric(&self) -> f64 {
        match self {
            ConnectionState::Disconnected => 0.0,
            ConnectionState::Connecting => 1.0,
            ConnectionState::Connected => 2.0,
            ConnectionState::Failed => 3.0,
            ConnectionState::Reconnecting => 4.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
