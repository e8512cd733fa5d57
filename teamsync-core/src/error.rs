//! Error types for teamsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read (missing, permission denied, etc.).
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A setting without a safe default is absent or empty.
    #[error("required setting {key} is missing or empty")]
    Missing { key: &'static str },

    /// A setting is present but unusable.
    #[error("setting {key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}
