//! Connection events, status snapshots and failure notifications.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::connection::state::ConnectionState;
use crate::resilience::classifier::{classify, matched_marker, FailureKind};

/// Where a failure was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOrigin {
    Bind,
    Operation,
    HealthCheck,
}

impl FailureOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureOrigin::Bind => "bind",
            FailureOrigin::Operation => "operation",
            FailureOrigin::HealthCheck => "health_check",
        }
    }
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub origin: FailureOrigin,
    pub message: String,
}

impl FailureDetail {
    pub fn classify(origin: FailureOrigin, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify(&message),
            origin,
            message,
        }
    }

    pub fn marker(&self) -> Option<&'static str> {
        matched_marker(&self.message)
    }
}

/// Events broadcast to subscribers (connection indicators, tests).
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
        failure: Option<FailureDetail>,
    },
    ReconnectScheduled {
        attempt: u32,
        max_retries: u32,
        delay: Duration,
    },
    AuthenticationFailed(AuthenticationFailure),
    RetriesExhausted(RetriesExhausted),
}

/// Point-in-time diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Reconnect attempts scheduled in the current cycle.
    pub retry_attempt: u32,
    pub last_error: Option<String>,
    /// Identifier of the live session, if any.
    pub session_id: Option<Uuid>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry_attempt: 0,
            last_error: None,
            session_id: None,
        }
    }
}

/// Payload of the authentication-failure notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticationFailure {
    pub origin: FailureOrigin,
    pub message: String,
}

/// Payload of the retries-exhausted notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetriesExhausted {
    pub attempts: u32,
    pub last_error: String,
}

/// Registered notification callback.
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Single-subscriber notification slots. Last registration wins.
#[derive(Default)]
pub struct Notifier {
    on_auth_failure: Mutex<Option<Handler<AuthenticationFailure>>>,
    on_retries_exhausted: Mutex<Option<Handler<RetriesExhausted>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_auth_failure_handler(&self, handler: Handler<AuthenticationFailure>) {
        replace(&self.on_auth_failure, handler);
    }

    pub fn set_retries_exhausted_handler(&self, handler: Handler<RetriesExhausted>) {
        replace(&self.on_retries_exhausted, handler);
    }

    /// Invoke the auth-failure handler. Returns whether one was registered.
    pub fn authentication_failed(&self, failure: &AuthenticationFailure) -> bool {
        match current(&self.on_auth_failure) {
            Some(handler) => {
                handler(failure);
                true
            }
            None => {
                tracing::warn!("No authentication failure handler registered");
                false
            }
        }
    }

    /// Invoke the retries-exhausted handler. Returns whether one was registered.
    pub fn retries_exhausted(&self, notice: &RetriesExhausted) -> bool {
        match current(&self.on_retries_exhausted) {
            Some(handler) => {
                handler(notice);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("on_auth_failure", &current(&self.on_auth_failure).is_some())
            .field("on_retries_exhausted", &current(&self.on_retries_exhausted).is_some())
            .finish()
    }
}

fn replace<T>(slot: &Mutex<Option<Handler<T>>>, handler: Handler<T>) {
    let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Some(handler);
}

// Clone the handler out so it runs without the slot lock held.
fn current<T>(slot: &Mutex<Option<Handler<T>>>) -> Option<Handler<T>> {
    slot.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}
