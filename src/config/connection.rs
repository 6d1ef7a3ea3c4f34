//! Runtime connection configuration.
//!
//! `ConnectionConfig` is built once (usually from a `DirectoryProfile`) and
//! handed to a `ConnectionManager`, which owns it for its whole lifetime.

use std::fmt;
use std::time::Duration;

/// Default LDAP ports.
pub const LDAP_PORT: u16 = 389;
pub const LDAPS_PORT: u16 = 636;

/// Bind identity and password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Fully-qualified bind identity (`user@domain` or a DN).
    pub bind_identity: String,
    pub password: String,
}

impl Credentials {
    pub fn new(bind_identity: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            bind_identity: bind_identity.into(),
            password: password.into(),
        }
    }

    /// Build the bind identity for `username`, appending `@domain` unless the
    /// name is already a UPN or a DN.
    pub fn for_user(username: &str, domain: Option<&str>, password: impl Into<String>) -> Self {
        let bind_identity = match domain {
            Some(domain) if !domain.is_empty() && !username.contains('@') && !username.contains('=') => {
                format!("{}@{}", username, domain)
            }
            _ => username.to_string(),
        };
        Self::new(bind_identity, password)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bind_identity", &self.bind_identity)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Reconnection policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Consecutive Transient failures tolerated before the cycle is abandoned.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Add up to 10% jitter to each delay (never above `max_delay`).
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: false,
        }
    }
}

/// Deadlines for network-bound calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeouts {
    /// Bind (connect + authenticate).
    pub bind: Duration,
    /// Caller operations, health probes and unbind.
    pub operation: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            bind: Duration::from_secs(10),
            operation: Duration::from_secs(30),
        }
    }
}

/// Immutable settings for one managed directory connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub server: String,
    pub port: u16,
    pub use_tls: bool,
    pub credentials: Credentials,
    /// Base DN; also the target of health probes.
    pub base_dn: String,
    pub retry: RetryPolicy,
    /// Interval between health probes. Zero disables probing.
    pub health_check_interval: Duration,
    pub timeouts: Timeouts,
}

impl ConnectionConfig {
    pub fn new(server: impl Into<String>, base_dn: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            server: server.into(),
            port: LDAP_PORT,
            use_tls: false,
            credentials,
            base_dn: base_dn.into(),
            retry: RetryPolicy::default(),
            health_check_interval: Duration::from_secs(30),
            timeouts: Timeouts::default(),
        }
    }

    /// Switch TLS on or off, moving the port to the matching default.
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self.port = if use_tls { LDAPS_PORT } else { LDAP_PORT };
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn scheme(&self) -> &'static str {
        if self.use_tls {
            "ldaps"
        } else {
            "ldap"
        }
    }

    /// Server URL, e.g. `ldaps://dc01.corp.example.com:636`.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.server, self.port)
    }
}
