//! Itemized results of sync and unlink batches.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use super::manifest::LinkType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FsOperation {
    Inspect,
    CreateDir,
    Symlink,
    Copy,
    Remove,
    ReadManifest,
    WriteManifest,
}

impl std::fmt::Display for FsOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Inspect => "inspect",
            Self::CreateDir => "create directory",
            Self::Symlink => "create symlink",
            Self::Copy => "copy",
            Self::Remove => "remove",
            Self::ReadManifest => "read manifest",
            Self::WriteManifest => "write manifest",
        };
        f.write_str(s)
    }
}

/// Per-entry filesystem failure. Collected, never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("Failed to {operation} {}: {message}", path.display())]
pub struct FilesystemOperationError {
    pub path: PathBuf,
    pub operation: FsOperation,
    pub message: String,
}

impl FilesystemOperationError {
    pub fn new(path: impl Into<PathBuf>, operation: FsOperation, message: impl ToString) -> Self {
        Self {
            path: path.into(),
            operation,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntryOutcome {
    Created { link_type: LinkType },
    Replaced { link_type: LinkType },
    Unchanged,
    /// Destination path is occupied by something this system did not create.
    Collision,
    /// Previously linked document no longer exists in the registry.
    Pruned,
    Failed { error: FilesystemOperationError },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncEntry {
    pub target_path: PathBuf,
    pub document_id: String,
    pub group: String,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub created: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub skipped_collision: usize,
    pub pruned: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    fn record(&mut self, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::Created { .. } => self.created += 1,
            EntryOutcome::Replaced { .. } => self.replaced += 1,
            EntryOutcome::Unchanged => self.unchanged += 1,
            EntryOutcome::Collision => self.skipped_collision += 1,
            EntryOutcome::Pruned => self.pruned += 1,
            EntryOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

impl std::fmt::Display for OutcomeCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} replaced, {} unchanged, {} skipped (collision), {} pruned, {} failed",
            self.created,
            self.replaced,
            self.unchanged,
            self.skipped_collision,
            self.pruned,
            self.failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub destination: PathBuf,
    pub dry_run: bool,
    pub entries: Vec<SyncEntry>,
    /// Batch-level failures (manifest access).
    pub errors: Vec<FilesystemOperationError>,
}

impl SyncReport {
    pub fn new(destination: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            destination: destination.into(),
            dry_run,
            entries: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn counts_by_group(&self) -> BTreeMap<String, OutcomeCounts> {
        let mut groups: BTreeMap<String, OutcomeCounts> = BTreeMap::new();
        for entry in &self.entries {
            groups
                .entry(entry.group.clone())
                .or_default()
                .record(&entry.outcome);
        }
        groups
    }

    pub fn totals(&self) -> OutcomeCounts {
        let mut totals = OutcomeCounts::default();
        for entry in &self.entries {
            totals.record(&entry.outcome);
        }
        totals
    }

    pub fn collisions(&self) -> impl Iterator<Item = &SyncEntry> {
        self.entries
            .iter()
            .filter(|e| e.outcome == EntryOutcome::Collision)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FilesystemOperationError> {
        self.entries
            .iter()
            .filter_map(|e| match &e.outcome {
                EntryOutcome::Failed { error } => Some(error),
                _ => None,
            })
            .chain(self.errors.iter())
    }

    /// No collisions and no filesystem errors.
    pub fn is_success(&self) -> bool {
        self.collisions().next().is_none() && self.failures().next().is_none()
    }

    /// Human-readable per-group summary.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (group, counts) in self.counts_by_group() {
            let _ = writeln!(out, "{:<28} {}", group, counts);
        }
        let _ = write!(out, "{:<28} {}", "total", self.totals());
        if self.dry_run {
            out.push_str(" (dry run)");
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnlinkOutcome {
    Removed,
    /// Recorded entry was replaced by user content; left in place.
    Foreign,
    /// Recorded entry was already gone.
    Missing,
    Failed { error: FilesystemOperationError },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlinkEntry {
    pub target_path: PathBuf,
    pub document_id: String,
    #[serde(flatten)]
    pub outcome: UnlinkOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlinkReport {
    pub destination: PathBuf,
    pub entries: Vec<UnlinkEntry>,
    pub removed_dirs: Vec<PathBuf>,
    pub errors: Vec<FilesystemOperationError>,
}

impl UnlinkReport {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            entries: Vec::new(),
            removed_dirs: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn count(&self, predicate: impl Fn(&UnlinkOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| predicate(&e.outcome)).count()
    }

    pub fn removed(&self) -> usize {
        self.count(|o| *o == UnlinkOutcome::Removed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FilesystemOperationError> {
        self.entries
            .iter()
            .filter_map(|e| match &e.outcome {
                UnlinkOutcome::Failed { error } => Some(error),
                _ => None,
            })
            .chain(self.errors.iter())
    }

    /// Foreign entries do not count as failures; they were never ours to remove.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} removed, {} left in place (not ours), {} already absent, {} failed, {} directories removed",
            self.removed(),
            self.count(|o| *o == UnlinkOutcome::Foreign),
            self.count(|o| *o == UnlinkOutcome::Missing),
            self.count(|o| matches!(o, UnlinkOutcome::Failed { .. })),
            self.removed_dirs.len()
        )
    }
}

/// Report group of a destination-relative path: `agents/<category>` or `commands`.
pub fn group_of(relative: &Path) -> String {
    let parts: Vec<_> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect();
    match parts.as_slice() {
        [kind, category, _, ..] if kind == "agents" => format!("{}/{}", kind, category),
        [kind, ..] => kind.to_string(),
        [] => String::new(),
    }
}
