//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (delays, timeouts, ports)
//! - Reject duplicate profile names and unusable hosts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: SessionConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::schema::{DirectoryProfile, SessionConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("no directories configured")]
    NoDirectories,

    #[error("directory name must not be empty")]
    EmptyName,

    #[error("duplicate directory name '{0}'")]
    DuplicateName(String),

    #[error("directory '{directory}': missing {field}")]
    Missing { directory: String, field: &'static str },

    #[error("directory '{directory}': invalid server '{server}'")]
    InvalidServer { directory: String, server: String },

    #[error("directory '{directory}': port must not be 0")]
    InvalidPort { directory: String },

    #[error("directory '{directory}': {field} must be a positive number of seconds, got {value}")]
    NonPositive {
        directory: String,
        field: &'static str,
        value: f64,
    },

    #[error("directory '{directory}': health_check_interval_secs must not be negative, got {value}")]
    NegativeInterval { directory: String, value: f64 },

    #[error("directory '{directory}': max_retry_delay_secs ({max}) is below initial_retry_delay_secs ({initial})")]
    DelayCapBelowInitial {
        directory: String,
        initial: f64,
        max: f64,
    },
}

/// Validate the whole configuration file.
pub fn validate_config(config: &SessionConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.directories.is_empty() {
        errors.push(ValidationError::NoDirectories);
    }

    let mut seen = HashSet::new();
    for profile in &config.directories {
        if !profile.name.is_empty() && !seen.insert(profile.name.as_str()) {
            errors.push(ValidationError::DuplicateName(profile.name.clone()));
        }
        errors.extend(validate_profile(profile));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one directory profile.
pub fn validate_profile(profile: &DirectoryProfile) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let directory = profile.name.clone();

    if profile.name.is_empty() {
        errors.push(ValidationError::EmptyName);
    }

    if profile.server.trim().is_empty() {
        errors.push(ValidationError::Missing {
            directory: directory.clone(),
            field: "server",
        });
    } else if !is_valid_host(&profile.server) {
        errors.push(ValidationError::InvalidServer {
            directory: directory.clone(),
            server: profile.server.clone(),
        });
    }

    if profile.base_dn.trim().is_empty() {
        errors.push(ValidationError::Missing {
            directory: directory.clone(),
            field: "base_dn",
        });
    }

    if profile.port == Some(0) {
        errors.push(ValidationError::InvalidPort {
            directory: directory.clone(),
        });
    }

    let positive = [
        ("initial_retry_delay_secs", profile.initial_retry_delay_secs),
        ("max_retry_delay_secs", profile.max_retry_delay_secs),
        ("bind_timeout_secs", profile.bind_timeout_secs),
        ("operation_timeout_secs", profile.operation_timeout_secs),
    ];
    for (field, value) in positive {
        if !(value.is_finite() && value > 0.0) {
            errors.push(ValidationError::NonPositive {
                directory: directory.clone(),
                field,
                value,
            });
        }
    }

    let interval = profile.health_check_interval_secs;
    if !(interval.is_finite() && interval >= 0.0) {
        errors.push(ValidationError::NegativeInterval {
            directory: directory.clone(),
            value: interval,
        });
    }

    if profile.max_retry_delay_secs < profile.initial_retry_delay_secs {
        errors.push(ValidationError::DelayCapBelowInitial {
            directory,
            initial: profile.initial_retry_delay_secs,
            max: profile.max_retry_delay_secs,
        });
    }

    errors
}

fn is_valid_host(server: &str) -> bool {
    match Url::parse(&format!("ldap://{}", server)) {
        Ok(url) => {
            url.host_str().is_some()
                && url.port().is_none()
                && url.username().is_empty()
                && url.path().is_empty()
                && url.query().is_none()
        }
        Err(_) => false,
    }
}
