//! Connection subsystem.
//!
//! # Data Flow
//! ```text
//! Caller
//!     → ConnectionManager::execute (executor.rs)
//!     → acquire: open / wait for reconnect (manager.rs)
//!     → operation(&mut Session) (session.rs)
//!     → failure: classify, transition (state.rs), notify (events.rs)
//! ```
//!
//! # Design Decisions
//! - The manager owns the only session; callers borrow it per operation
//! - Protocol clients plug in through `DirectoryConnector`
//! - Status is published through a watch channel so reads never take the lock

pub mod events;
pub mod executor;
pub mod manager;
pub mod session;
pub mod state;

pub use events::{
    AuthenticationFailure, ConnectionEvent, ConnectionStatus, FailureDetail, FailureOrigin,
    RetriesExhausted,
};
pub use manager::ConnectionManager;
pub use session::{DirectoryConnector, DirectoryError, DirectorySession};
pub use state::ConnectionState;
