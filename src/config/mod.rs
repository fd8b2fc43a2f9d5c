//! Settings for the linker and CLI.
//!
//! Sources (lowest to highest priority):
//! 1. Defaults: destination `~/.claude`, source repository is the current directory
//! 2. Settings file: `--config <file>` or `~/.claude/agent-link.json`
//! 3. Environment: `AGENT_LINK_DEST`, `AGENT_LINK_SOURCE`, `AGENT_LINK_MODE`
//! 4. Command line flags, applied by the caller

pub mod env;
pub mod settings;

pub use env::{ENV_PREFIX, EnvOverrides};
pub use settings::{RootSettings, SETTINGS_FILE, Settings, SettingsLoader};

use thiserror::Error;

/// Errors that can occur in configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// The key with invalid value
        key: String,
        /// Error message
        message: String,
    },

    /// No home directory to derive default paths from
    #[error("Cannot determine home directory; pass an explicit {what}")]
    NoHome { what: &'static str },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),
}

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
