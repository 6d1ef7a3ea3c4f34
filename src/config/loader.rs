//! Configuration loading from disk.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::schema::SessionConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "DIRSESSION_CONFIG";

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "dirsession.toml";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("no configuration file found (searched: {})", join_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("unknown directory '{name}' (available: {})", .available.join(", "))]
    UnknownDirectory { name: String, available: Vec<String> },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<SessionConfig, ConfigError> {
    let config: SessionConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<SessionConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Candidate configuration paths in priority order.
///
/// `DIRSESSION_CONFIG`, then the user config directory
/// (`$XDG_CONFIG_HOME` or `$HOME/.config`), then the working directory.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(explicit) = env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        paths.push(PathBuf::from(explicit));
    }

    let user_dir = env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")));
    if let Some(dir) = user_dir {
        paths.push(dir.join("dirsession").join("config.toml"));
    }

    paths.push(PathBuf::from(LOCAL_CONFIG_FILE));
    paths
}

/// Resolve the configuration file: `explicit` if given, otherwise the first
/// existing entry of `candidates`.
pub fn locate_config(explicit: Option<&Path>, candidates: &[PathBuf]) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| ConfigError::NotFound {
            searched: candidates.to_vec(),
        })
}
