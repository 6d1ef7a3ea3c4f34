//! Seams to the directory protocol client.
//!
//! The manager never speaks the wire protocol itself. A `DirectoryConnector`
//! performs the bind and hands back a `DirectorySession`, which the manager
//! owns exclusively until it is unbound.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ConnectionConfig;

/// Free-text failure reported by a protocol client.
///
/// Clients rarely expose structured codes, so the message is what the
/// classifier sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DirectoryError {
    pub message: String,
}

impl DirectoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for DirectoryError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for DirectoryError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Establishes authenticated sessions.
#[async_trait]
pub trait DirectoryConnector: Send + Sync + 'static {
    type Session: DirectorySession;

    /// Connect to the server and bind with the configured credentials.
    async fn bind(&self, config: &ConnectionConfig) -> Result<Self::Session, DirectoryError>;
}

/// A live, authenticated session. Not safe for concurrent use.
#[async_trait]
pub trait DirectorySession: Send + 'static {
    /// Cheap no-op round trip used by the health monitor.
    async fn probe(&mut self, base_dn: &str) -> Result<(), DirectoryError>;

    /// Release the session on the server side.
    async fn unbind(&mut self) -> Result<(), DirectoryError>;
}
