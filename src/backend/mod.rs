//! Protocol client implementations.
//!
//! # Design Decisions
//! - The manager only sees `DirectoryConnector` / `DirectorySession`
//! - The `ldap3` client sits behind the `ldap` feature so the library builds
//!   without a TLS toolchain

#[cfg(feature = "ldap")]
pub mod ldap;

#[cfg(feature = "ldap")]
pub use ldap::{LdapConnector, LdapSession};
