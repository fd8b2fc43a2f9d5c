//! Destination-side record of the entries this system created.
//!
//! The manifest is what makes "is this link mine?" an explicit predicate. A path
//! in the destination is owned only if it is listed here and still matches what
//! was recorded (same symlink target, or same copied content).
//!
//! Each entry also carries the lineage of the source root it was linked from, so
//! a destination shared by several libraries keeps their entries apart.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::CapabilityKind;

pub const MANIFEST_FILE: &str = ".agent-link.json";
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Symlink,
    Copy,
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Symlink => write!(f, "symlink"),
            Self::Copy => write!(f, "copy"),
        }
    }
}

/// One materialized document in the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkEntry {
    /// Relative to the destination root.
    pub target_path: PathBuf,
    pub source_document_id: String,
    pub kind: CapabilityKind,
    pub source_path: PathBuf,
    /// [`lineage_of`] the kind root the source document was loaded from.
    pub lineage: String,
    pub link_type: LinkType,
    /// BLAKE3 of the copied bytes; only set for copies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkManifest {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub entries: Vec<LinkEntry>,
    /// Directories the linker created, relative to the destination root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub created_dirs: Vec<PathBuf>,
}

impl Default for LinkManifest {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkManifest {
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION,
            updated_at: Utc::now(),
            entries: Vec::new(),
            created_dirs: Vec::new(),
        }
    }

    pub fn path(destination: &Path) -> PathBuf {
        destination.join(MANIFEST_FILE)
    }

    /// Read the manifest of `destination`. A missing file is `Ok(None)`.
    pub fn load(destination: &Path) -> crate::Result<Option<Self>> {
        let path = Self::path(destination);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(crate::Error::Manifest {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        let manifest: Self =
            serde_json::from_str(&content).map_err(|e| crate::Error::Manifest {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if manifest.version > MANIFEST_VERSION {
            return Err(crate::Error::Manifest {
                path,
                reason: format!(
                    "unsupported manifest version {} (expected <= {})",
                    manifest.version, MANIFEST_VERSION
                ),
            });
        }
        Ok(Some(manifest))
    }

    /// Write atomically via a temporary sibling file. An empty manifest deletes the file.
    pub fn save(&mut self, destination: &Path) -> crate::Result<()> {
        let path = Self::path(destination);
        if self.entries.is_empty() {
            return match std::fs::remove_file(&path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        self.entries.sort_by(|a, b| a.target_path.cmp(&b.target_path));
        self.created_dirs.sort();
        self.updated_at = Utc::now();

        std::fs::create_dir_all(destination)?;
        let tmp = destination.join(format!("{}.tmp", MANIFEST_FILE));
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn entry(&self, target_path: &Path) -> Option<&LinkEntry> {
        self.entries.iter().find(|e| e.target_path == target_path)
    }

    pub fn upsert(&mut self, entry: LinkEntry) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.target_path == entry.target_path)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, target_path: &Path) -> Option<LinkEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.target_path == target_path)?;
        Some(self.entries.remove(index))
    }

    pub fn record_dir(&mut self, relative: PathBuf) {
        if !self.created_dirs.contains(&relative) {
            self.created_dirs.push(relative);
        }
    }

    pub fn is_created_dir(&self, relative: &Path) -> bool {
        self.created_dirs.iter().any(|d| d == relative)
    }

    pub fn forget_dir(&mut self, relative: &Path) {
        self.created_dirs.retain(|d| d != relative);
    }
}

/// Stable fingerprint of a canonical source root.
pub fn lineage_of(root: &Path) -> String {
    let hash = blake3::hash(root.to_string_lossy().as_bytes());
    hash.to_hex().as_str()[..16].to_string()
}

/// BLAKE3 digest of a file's bytes, hex encoded.
pub fn file_digest(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
