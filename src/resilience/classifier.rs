//! Failure classification.
//!
//! # Responsibilities
//! - Decide whether a directory failure is worth retrying
//! - Keep the authentication marker list in one place
//!
//! # Design Decisions
//! - Protocol clients report failures as free text, so classification is a
//!   case-insensitive substring match, not an error-type match
//! - Markers are ordered most-specific first; `matched_marker` reports the
//!   first hit for logging
//! - Anything without a marker is Transient (never panics, empty is Transient)

use serde::Serialize;
use std::fmt;

/// Lower-case substrings that mark a failure as an authentication failure.
///
/// Matching is case-insensitive. The bare string `49` is intentionally absent:
/// it would match ports, counts and timestamps.
pub const AUTHENTICATION_MARKERS: &[&str] = &[
    "automatic bind not successful - invalidcredentials",
    "bind not successful - invalidcredentials",
    "invalidcredentials",
    "invalid credentials",
    "authentication failed",
    "bind failed",
    "access denied",
    "login failed",
    "unauthorized",
    "invalid username",
    "invalid password",
    // LDAP result code 49 as rendered by ldap3 ("rc=49 (invalidCredentials)")
    "rc=49",
    "code 49",
];

/// Classified kind of a directory failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Credentials were rejected. Retrying with the same credentials cannot help.
    Authentication,
    /// Network, timeout or availability problem. Retried per policy.
    Transient,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Authentication => "authentication",
            FailureKind::Transient => "transient",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a raw failure message.
pub fn classify(message: &str) -> FailureKind {
    if matched_marker(message).is_some() {
        FailureKind::Authentication
    } else {
        FailureKind::Transient
    }
}

/// Return the first authentication marker contained in `message`, if any.
pub fn matched_marker(message: &str) -> Option<&'static str> {
    if message.is_empty() {
        return None;
    }
    let lowered = message.to_lowercase();
    AUTHENTICATION_MARKERS
        .iter()
        .copied()
        .find(|marker| lowered.contains(marker))
}
