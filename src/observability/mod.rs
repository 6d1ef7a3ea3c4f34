//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Connection manager produces:
//!     → tracing events (every transition, every classified failure)
//!     → metrics.rs (state gauge, failure / reconnect counters)
//!     → ConnectionEvent broadcast (for UIs and tests)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`from`, `to`, `kind`, `error`) are the operator contract
//! - Metrics are cheap (atomic increments) and off unless a recorder is installed

pub mod logging;
pub mod metrics;
