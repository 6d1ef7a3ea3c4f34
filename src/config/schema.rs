//! Configuration schema definitions.
//!
//! This module defines the on-disk configuration structure. All types derive
//! Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::connection::{
    ConnectionConfig, Credentials, RetryPolicy, Timeouts, LDAPS_PORT, LDAP_PORT,
};

/// Root configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Directory profiles. The first one is the default.
    pub directories: Vec<DirectoryProfile>,
}

impl SessionConfig {
    /// Look up a profile by name, or the default profile when `name` is `None`.
    pub fn directory(&self, name: Option<&str>) -> Option<&DirectoryProfile> {
        match name {
            Some(name) => self.directories.iter().find(|d| d.name == name),
            None => self.directories.first(),
        }
    }

    pub fn directory_names(&self) -> Vec<&str> {
        self.directories.iter().map(|d| d.name.as_str()).collect()
    }
}

/// One directory (e.g. an AD domain) the manager can connect to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryProfile {
    /// Profile identifier used on the command line and in logs.
    pub name: String,

    /// Server host name or address.
    pub server: String,

    /// Server port. Defaults to 636 with TLS, 389 without.
    pub port: Option<u16>,

    /// Connect with TLS (ldaps).
    pub use_tls: bool,

    /// Domain appended to bare user names (`user@domain`).
    pub domain: Option<String>,

    /// Base DN for browsing and health probes.
    pub base_dn: String,

    /// Maximum consecutive reconnect attempts.
    pub max_retries: u32,

    /// First reconnect delay in seconds.
    pub initial_retry_delay_secs: f64,

    /// Reconnect delay cap in seconds.
    pub max_retry_delay_secs: f64,

    /// Health probe interval in seconds (0 disables probing).
    pub health_check_interval_secs: f64,

    /// Bind timeout in seconds.
    pub bind_timeout_secs: f64,

    /// Operation / probe timeout in seconds.
    pub operation_timeout_secs: f64,

    /// Add jitter to reconnect delays.
    pub jitter: bool,
}

impl Default for DirectoryProfile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            server: String::new(),
            port: None,
            use_tls: false,
            domain: None,
            base_dn: String::new(),
            max_retries: 5,
            initial_retry_delay_secs: 1.0,
            max_retry_delay_secs: 60.0,
            health_check_interval_secs: 30.0,
            bind_timeout_secs: 10.0,
            operation_timeout_secs: 30.0,
            jitter: false,
        }
    }
}

impl DirectoryProfile {
    pub fn effective_port(&self) -> u16 {
        self.port
            .unwrap_or(if self.use_tls { LDAPS_PORT } else { LDAP_PORT })
    }

    /// Build the runtime configuration for `username`.
    ///
    /// Expects a validated profile; durations are taken as-is.
    pub fn to_connection_config(&self, username: &str, password: &str) -> ConnectionConfig {
        let credentials = Credentials::for_user(username, self.domain.as_deref(), password);

        ConnectionConfig {
            server: self.server.clone(),
            port: self.effective_port(),
            use_tls: self.use_tls,
            credentials,
            base_dn: self.base_dn.clone(),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                initial_delay: secs(self.initial_retry_delay_secs),
                max_delay: secs(self.max_retry_delay_secs),
                jitter: self.jitter,
            },
            health_check_interval: secs(self.health_check_interval_secs),
            timeouts: Timeouts {
                bind: secs(self.bind_timeout_secs),
                operation: secs(self.operation_timeout_secs),
            },
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
