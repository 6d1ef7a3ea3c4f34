//! Error taxonomy surfaced by the connection manager.

use thiserror::Error;

/// Errors returned by `ConnectionManager` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Credentials were rejected. Not retried; new credentials are required.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Network, timeout or availability failure.
    #[error("transient directory failure: {message}")]
    Transient { message: String },

    /// The reconnection policy gave up.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// The manager was shut down.
    #[error("connection manager is closed")]
    ManagerClosed,
}

impl ConnectionError {
    /// Whether this error ends the current connection cycle.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ConnectionError::Transient { .. })
    }
}

/// Result type for connection manager operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConnectionError::RetriesExhausted {
            attempts: 5,
            last_error: "bind timed out after 5.0s".into(),
        };
        assert_eq!(
            err.to_string(),
            "retries exhausted after 5 attempts: bind timed out after 5.0s"
        );
        assert_eq!(ConnectionError::ManagerClosed.to_string(), "connection manager is closed");
    }

    #[test]
    fn test_terminality() {
        let auth = ConnectionError::Authentication {
            message: "invalid credentials".into(),
        };
        assert!(auth.is_terminal());

        let transient = ConnectionError::Transient {
            message: "connection refused".into(),
        };
        assert!(!transient.is_terminal());

        assert!(ConnectionError::ManagerClosed.is_terminal());
    }
}
