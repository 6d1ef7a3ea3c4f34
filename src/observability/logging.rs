//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for the binary
//! - Let `RUST_LOG` override the configured level
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging; library code only emits
//!   events and never installs a subscriber itself

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for `level`.
pub fn default_directive(level: &str) -> String {
    format!("dirsession={}", level)
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if let Err(e) = result {
        eprintln!("logging already initialized: {}", e);
    }
}
