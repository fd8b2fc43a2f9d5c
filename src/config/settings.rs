//! `agent-link.json` settings with layered loading.
//!
//! Loads settings from (lowest to highest priority):
//! 1. Defaults
//! 2. Settings file: an explicit path, or `~/.claude/agent-link.json` when present
//! 3. Environment overrides (`AGENT_LINK_*`)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigResult, EnvOverrides};
use crate::common::SourceType;
use crate::linker::{LinkMode, SyncOptions};
use crate::registry::{CapabilityKind, RootSpec};

pub const SETTINGS_FILE: &str = "agent-link.json";

/// One configured root.
///
/// Without `kind` the path is a repository holding `agents/` and `commands/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootSettings {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<CapabilityKind>,
}

impl RootSettings {
    pub fn repository(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            trust: None,
            source: None,
            kind: None,
        }
    }

    /// Explicit trust, else the default of the declared source, else 0.
    pub fn trust_level(&self) -> i32 {
        self.trust
            .or_else(|| self.source.map(|s| s.default_trust_level()))
            .unwrap_or(0)
    }

    pub fn to_specs(&self) -> Vec<RootSpec> {
        match self.kind {
            Some(kind) => vec![RootSpec::new(&self.path, kind, self.trust_level())],
            None => RootSpec::repository(&self.path, self.trust_level()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<LinkMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_to_copy: Option<bool>,

    #[serde(default)]
    pub roots: Vec<RootSettings>,
}

impl Settings {
    /// Configured destination, or `~/.claude`.
    pub fn destination(&self) -> ConfigResult<PathBuf> {
        if let Some(dest) = &self.destination {
            return Ok(dest.clone());
        }
        crate::common::home_dir()
            .map(|home| home.join(".claude"))
            .ok_or(ConfigError::NoHome { what: "--dest" })
    }

    /// Root specs in configured order; the current directory when none are configured.
    pub fn root_specs(&self) -> ConfigResult<Vec<RootSpec>> {
        if self.roots.is_empty() {
            let cwd = std::env::current_dir()?;
            return Ok(RootSpec::repository(cwd, SourceType::Shipped.default_trust_level()));
        }
        Ok(self.roots.iter().flat_map(RootSettings::to_specs).collect())
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            mode: self.mode.unwrap_or_default(),
            fallback_to_copy: self.fallback_to_copy.unwrap_or(false),
            ..SyncOptions::default()
        }
    }

    /// Environment sources replace the configured roots.
    pub fn apply_env(&mut self, env: &EnvOverrides) {
        if let Some(dest) = &env.destination {
            self.destination = Some(dest.clone());
        }
        if !env.sources.is_empty() {
            self.roots = env.sources.iter().map(RootSettings::repository).collect();
        }
        if let Some(mode) = env.mode {
            self.mode = Some(mode);
        }
    }

    fn merge(&mut self, other: Settings) {
        if other.destination.is_some() {
            self.destination = other.destination;
        }
        if other.mode.is_some() {
            self.mode = other.mode;
        }
        if other.fallback_to_copy.is_some() {
            self.fallback_to_copy = other.fallback_to_copy;
        }
        if !other.roots.is_empty() {
            self.roots = other.roots;
        }
    }
}

#[derive(Debug, Default)]
pub struct SettingsLoader {
    settings: Settings,
    loaded_from: Option<PathBuf>,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// `~/.claude/agent-link.json`
    pub fn default_path() -> Option<PathBuf> {
        crate::common::home_dir().map(|home| home.join(".claude").join(SETTINGS_FILE))
    }

    /// Load the settings file, then environment overrides.
    ///
    /// An explicit path must exist; the default path is optional.
    pub async fn load(
        &mut self,
        explicit: Option<&Path>,
        env: &EnvOverrides,
    ) -> ConfigResult<&Settings> {
        match explicit {
            Some(path) => self.merge_file(path).await?,
            None => {
                if let Some(path) = Self::default_path()
                    && tokio::fs::try_exists(&path).await.unwrap_or(false)
                {
                    self.merge_file(&path).await?;
                }
            }
        }

        self.settings.apply_env(env);
        Ok(&self.settings)
    }

    async fn merge_file(&mut self, path: &Path) -> ConfigResult<()> {
        let content = tokio::fs::read_to_string(path).await?;
        let file_settings: Settings = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded settings file");
        self.settings.merge(file_settings);
        self.loaded_from = Some(path.to_path_buf());
        Ok(())
    }

    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_settings_json_shape() {
        let json = r#"{
            "destination": "/home/me/.claude",
            "mode": "copy",
            "fallbackToCopy": true,
            "roots": [
                {"path": "/lib/shipped"},
                {"path": "/home/me/.claude-library", "source": "user"},
                {"path": "/work/agents", "kind": "agent", "trust": 50}
            ]
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.destination().unwrap(), PathBuf::from("/home/me/.claude"));
        assert_eq!(settings.mode, Some(LinkMode::Copy));
        let options = settings.sync_options();
        assert!(options.fallback_to_copy);
        assert!(options.prune);

        let specs = settings.root_specs().unwrap();
        assert_eq!(specs.len(), 5);
        assert_eq!(specs[0].path, PathBuf::from("/lib/shipped/agents"));
        assert_eq!(specs[0].trust_level, 0);
        assert_eq!(specs[2].trust_level, 10);
        assert_eq!(specs[4].kind, CapabilityKind::Agent);
        assert_eq!(specs[4].trust_level, 50);
    }

    #[test]
    fn test_default_roots_use_current_dir() {
        let specs = Settings::default().root_specs().unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(specs[0].path, cwd.join("agents"));
        assert_eq!(specs[1].path, cwd.join("commands"));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut settings = Settings {
            destination: Some(PathBuf::from("/from/file")),
            roots: vec![RootSettings::repository("/from/file/lib")],
            ..Default::default()
        };
        settings.apply_env(&EnvOverrides {
            destination: Some(PathBuf::from("/from/env")),
            sources: vec![PathBuf::from("/env/lib")],
            mode: Some(LinkMode::Copy),
        });

        assert_eq!(settings.destination, Some(PathBuf::from("/from/env")));
        assert_eq!(settings.roots, vec![RootSettings::repository("/env/lib")]);
        assert_eq!(settings.mode, Some(LinkMode::Copy));
    }

    #[tokio::test]
    async fn test_loader_explicit_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent-link.json");
        std::fs::write(&path, r#"{"destination": "/x", "mode": "symlink"}"#).unwrap();

        let mut loader = SettingsLoader::new();
        let settings = loader.load(Some(&path), &EnvOverrides::default()).await.unwrap();
        assert_eq!(settings.destination, Some(PathBuf::from("/x")));
        assert_eq!(loader.loaded_from(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_loader_missing_explicit_file_is_error() {
        let dir = tempdir().unwrap();
        let mut loader = SettingsLoader::new();
        let err = loader
            .load(Some(&dir.path().join("nope.json")), &EnvOverrides::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[tokio::test]
    async fn test_loader_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agent-link.json");
        std::fs::write(&path, "{ destination: ").unwrap();

        let err = SettingsLoader::new()
            .load(Some(&path), &EnvOverrides::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Serialization(_)));
    }
}
