//! Environment variable overrides.
//!
//! Environment variables are read once into an [`EnvOverrides`] value; nothing
//! here mutates the process environment.

use std::path::PathBuf;

use super::{ConfigError, ConfigResult};
use crate::linker::LinkMode;

pub const ENV_PREFIX: &str = "AGENT_LINK_";

/// Overrides taken from `AGENT_LINK_*` variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub destination: Option<PathBuf>,
    /// `AGENT_LINK_SOURCE`, split like `PATH`.
    pub sources: Vec<PathBuf>,
    pub mode: Option<LinkMode>,
}

impl EnvOverrides {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| match std::env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::Env(e)),
        })
    }

    /// Build overrides from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> ConfigResult<Option<String>>,
    {
        let get = |name: &str| -> ConfigResult<Option<String>> {
            Ok(lookup(&env_key(name))?.filter(|v| !v.trim().is_empty()))
        };

        let destination = get("DEST")?.map(PathBuf::from);
        let sources = get("SOURCE")?
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default();
        let mode = get("MODE")?
            .map(|v| {
                v.parse::<LinkMode>()
                    .map_err(|e| ConfigError::InvalidValue {
                        key: env_key("MODE"),
                        message: e.to_string(),
                    })
            })
            .transpose()?;

        Ok(Self {
            destination,
            sources,
            mode,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.destination.is_none() && self.sources.is_empty() && self.mode.is_none()
    }
}

fn env_key(name: &str) -> String {
    format!("{}{}", ENV_PREFIX, name)
}
