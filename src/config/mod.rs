//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (locate, parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SessionConfig (validated, immutable)
//!     → DirectoryProfile::to_connection_config(user, password)
//!     → ConnectionConfig (owned by one ConnectionManager)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a new connection needs a new manager
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Credentials never live in the file

pub mod connection;
pub mod loader;
pub mod schema;
pub mod validation;

pub use connection::{ConnectionConfig, Credentials, RetryPolicy, Timeouts};
pub use loader::{load_config, locate_config, search_paths, ConfigError};
pub use schema::{DirectoryProfile, ObservabilityConfig, SessionConfig};
pub use validation::ValidationError;
