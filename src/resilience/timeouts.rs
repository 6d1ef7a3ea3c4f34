//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap every network-bound directory call with a deadline
//! - Flatten the outcome into the free-text form the classifier consumes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timeout message never contains an authentication marker, so timeouts
//!   always classify as Transient

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Run `fut` under `limit`, mapping both errors and timeouts to a message.
pub async fn with_deadline<T, E, F>(what: &str, limit: Duration, fut: F) -> Result<T, String>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(timeout_message(what, limit)),
    }
}

pub fn timeout_message(what: &str, limit: Duration) -> String {
    format!("{} timed out after {:.1}s", what, limit.as_secs_f64())
}
