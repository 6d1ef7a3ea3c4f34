//! Directory session manager library.
//!
//! Keeps one authenticated session to an LDAP / Active Directory server
//! alive: classifies failures, reconnects with exponential backoff, probes
//! the session periodically and stops for good when credentials are
//! rejected.

// Core
pub mod connection;
pub mod error;

// Protocol clients
pub mod backend;

// Cross-cutting concerns
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ConnectionConfig;
pub use connection::{
    ConnectionEvent, ConnectionManager, ConnectionState, ConnectionStatus, DirectoryConnector,
    DirectoryError, DirectorySession,
};
pub use error::{ConnectionError, ConnectionResult};
