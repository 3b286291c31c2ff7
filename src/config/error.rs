use std::path::PathBuf;
use thiserror::Error;

/// Why the stored configuration could not be used as-is.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDirectory,

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Config version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: String, supported: String },

    #[error("Failed to migrate config from version {from}: {reason}")]
    Migration { from: String, reason: String },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Errors the user has to resolve by resetting the configuration or quitting.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, ConfigError::NotFound(_))
    }
}
