//! Capability document types.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

fn separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s_\-]+").expect("valid separator regex"))
}

/// Lowercase and hyphenate a name: whitespace and underscores become `-`,
/// runs collapse, leading and trailing hyphens are dropped.
pub fn normalize_name(raw: &str) -> String {
    separator_regex()
        .replace_all(raw.trim().to_lowercase().as_str(), "-")
        .trim_matches('-')
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Agent,
    Command,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 2] = [CapabilityKind::Agent, CapabilityKind::Command];

    /// Directory name for this kind in both source and destination layouts.
    pub fn subdir(&self) -> &'static str {
        match self {
            Self::Agent => "agents",
            Self::Command => "commands",
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent => write!(f, "agent"),
            Self::Command => write!(f, "command"),
        }
    }
}

impl std::str::FromStr for CapabilityKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "agent" | "agents" => Ok(Self::Agent),
            "command" | "commands" => Ok(Self::Command),
            other => Err(crate::Error::Config(format!(
                "Unknown capability kind '{}': expected agent or command",
                other
            ))),
        }
    }
}

/// Closed set of agent categories (first directory under `agents/`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentCategory {
    Core,
    Orchestrators,
    Specialized,
    Universal,
}

impl AgentCategory {
    pub const ALL: [AgentCategory; 4] = [
        AgentCategory::Core,
        AgentCategory::Orchestrators,
        AgentCategory::Specialized,
        AgentCategory::Universal,
    ];

    pub fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Orchestrators => "orchestrators",
            Self::Specialized => "specialized",
            Self::Universal => "universal",
        }
    }
}

impl std::fmt::Display for AgentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered agent or command document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityDocument {
    /// Path relative to the kind root, extension stripped, `/`-separated, lowercase.
    pub id: String,
    pub kind: CapabilityKind,
    pub name: String,
    pub description: String,
    pub source_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<AgentCategory>,
    #[serde(skip)]
    pub content: String,
    pub root_index: usize,
    pub trust_level: i32,
}

impl CapabilityDocument {
    /// Derive an id from a path relative to its kind root.
    pub fn id_from_relative(relative: &Path) -> String {
        let without_ext = relative.with_extension("");
        without_ext
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Destination path relative to the destination root.
    pub fn relative_target(&self) -> PathBuf {
        let mut path = PathBuf::from(self.kind.subdir());
        let mut segments = self.id.split('/').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("{}.md", segment));
            }
        }
        path
    }

    /// The kind root this document was loaded from.
    pub fn source_root(&self) -> Option<&Path> {
        self.source_path.ancestors().nth(self.id.split('/').count())
    }

    /// Report grouping key: `agents/<category>` or `commands`.
    pub fn group_key(&self) -> String {
        match self.category {
            Some(category) => format!("{}/{}", self.kind.subdir(), category),
            None => self.kind.subdir().to_string(),
        }
    }

    /// The reference token that invokes this document.
    pub fn reference_token(&self) -> String {
        match self.kind {
            CapabilityKind::Agent => format!("@agent-{}", self.name),
            CapabilityKind::Command => format!("/{}", self.name),
        }
    }
}
