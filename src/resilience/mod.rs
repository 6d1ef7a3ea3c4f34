//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Directory call (bind / operation / probe):
//!     → timeouts.rs (enforce deadline, flatten to message)
//!     → On failure: classifier.rs (Authentication or Transient)
//!     → Transient: backoff.rs (next delay, attempt bookkeeping)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every network-bound call has a deadline
//! - Authentication failures are never retried
//! - Backoff is deterministic unless jitter is explicitly enabled

pub mod backoff;
pub mod classifier;
pub mod timeouts;

pub use backoff::{next_delay, RetryContext};
pub use classifier::{classify, FailureKind};
