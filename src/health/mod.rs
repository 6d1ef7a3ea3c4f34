//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Connected (connect_locked arms the monitor):
//!     Periodic timer (monitor.rs)
//!     → lock manager, check token and state
//!     → probe session under the operation timeout
//!     → failure: disarm own slot → manager failure path → monitor exits
//! ```
//!
//! # Design Decisions
//! - Health is a property of the single session, not of the server
//! - A failed probe is treated exactly like a failed operation
//! - An interval of zero disables probing

pub mod monitor;
