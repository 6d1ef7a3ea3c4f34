//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     ConnectionManager::shutdown() / Drop
//!     → Shutdown::trigger()
//!     → every ShutdownSignal resolves (timers, probes, in-flight calls)
//!
//! Timers (timer.rs):
//!     reconnect / health task spawned → TimerSlot::arm(token)
//!     → task wakes, checks its token under the manager lock
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary calls ConnectionManager::shutdown()
//! ```
//!
//! # Design Decisions
//! - One shutdown signal per manager, observable by late subscribers
//! - At most one armed task per timer slot; stale tasks are ignored

pub mod shutdown;
pub mod signals;
pub mod timer;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use timer::TimerSlot;
