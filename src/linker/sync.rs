//! Materializes a resolved registry into a destination root, and reverses it.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::manifest::{LinkEntry, LinkManifest, LinkType, file_digest, lineage_of};
use super::report::{
    EntryOutcome, FilesystemOperationError, FsOperation, SyncEntry, SyncReport, UnlinkEntry,
    UnlinkOutcome, UnlinkReport, group_of,
};
use crate::registry::{CapabilityDocument, ResolvedRegistry};

/// How new entries are materialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    #[default]
    Symlink,
    /// For environments without symlink support (e.g. Windows without developer mode).
    Copy,
}

impl std::str::FromStr for LinkMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "symlink" | "link" => Ok(Self::Symlink),
            "copy" => Ok(Self::Copy),
            other => Err(crate::Error::Config(format!(
                "Unknown link mode '{}': expected symlink or copy",
                other
            ))),
        }
    }
}

impl LinkMode {
    fn link_type(&self) -> LinkType {
        match self {
            Self::Symlink => LinkType::Symlink,
            Self::Copy => LinkType::Copy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub mode: LinkMode,
    /// Retry a failed symlink creation as a copy.
    pub fallback_to_copy: bool,
    /// Plan outcomes without touching the filesystem.
    pub dry_run: bool,
    /// Remove owned entries whose document left the registry.
    pub prune: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            mode: LinkMode::Symlink,
            fallback_to_copy: false,
            dry_run: false,
            prune: true,
        }
    }
}

/// What currently occupies a destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TargetState {
    Missing,
    Symlink(PathBuf),
    File,
    Other,
}

fn inspect(target: &Path) -> io::Result<TargetState> {
    let metadata = match std::fs::symlink_metadata(target) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(TargetState::Missing),
        Err(e) => return Err(e),
    };
    if metadata.file_type().is_symlink() {
        Ok(TargetState::Symlink(std::fs::read_link(target)?))
    } else if metadata.is_file() {
        Ok(TargetState::File)
    } else {
        Ok(TargetState::Other)
    }
}

#[cfg(unix)]
fn create_symlink(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn create_symlink(source: &Path, target: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(source, target)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_source: &Path, _target: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

/// First directory between `destination` and `relative`'s parent that is a symlink.
///
/// Writing through such a directory would land inside whatever it points at.
fn symlinked_ancestor(destination: &Path, relative: &Path) -> Option<PathBuf> {
    let mut current = destination.to_path_buf();
    let parent = relative.parent()?;
    for component in parent.components() {
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(m) if m.file_type().is_symlink() => return Some(current),
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    None
}

/// Create the missing directories above `relative`, recording each one created.
fn create_parents(
    destination: &Path,
    relative: &Path,
    manifest: &mut LinkManifest,
) -> io::Result<()> {
    std::fs::create_dir_all(destination)?;
    let Some(parent) = relative.parent() else {
        return Ok(());
    };
    let mut current = PathBuf::new();
    for component in parent.components() {
        current.push(component);
        match std::fs::create_dir(destination.join(&current)) {
            Ok(()) => manifest.record_dir(current.clone()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Remove empty directories above `target` that the linker created.
///
/// Stops at the first directory that is not recorded, not empty, or is the
/// destination root itself.
fn remove_created_parents(
    target: &Path,
    destination: &Path,
    manifest: &mut LinkManifest,
) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    let mut current = target.parent();
    while let Some(dir) = current {
        let Ok(relative) = dir.strip_prefix(destination) else {
            break;
        };
        if relative.as_os_str().is_empty() || !manifest.is_created_dir(relative) {
            break;
        }
        if std::fs::remove_dir(dir).is_err() {
            break;
        }
        manifest.forget_dir(relative);
        tracing::debug!(dir = %dir.display(), "Removed empty directory");
        removed.push(dir.to_path_buf());
        current = dir.parent();
    }
    removed
}

fn document_lineage(document: &CapabilityDocument) -> String {
    document
        .source_root()
        .map(lineage_of)
        .unwrap_or_default()
}

/// Lineages of every source root feeding `registry`.
fn registry_lineages(registry: &ResolvedRegistry) -> HashSet<String> {
    registry
        .source_roots()
        .iter()
        .map(|root| lineage_of(root))
        .chain(registry.iter().map(document_lineage))
        .collect()
}

/// Projects a [`ResolvedRegistry`] into a destination root.
///
/// The destination is always an explicit argument; the linker holds no
/// process-wide state.
#[derive(Debug, Clone)]
pub struct Linker {
    options: SyncOptions,
}

impl Default for Linker {
    fn default() -> Self {
        Self::new()
    }
}

impl Linker {
    pub fn new() -> Self {
        Self {
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    fn load_manifest(
        &self,
        destination: &Path,
    ) -> Result<Option<LinkManifest>, FilesystemOperationError> {
        LinkManifest::load(destination).map_err(|e| {
            FilesystemOperationError::new(
                LinkManifest::path(destination),
                FsOperation::ReadManifest,
                e,
            )
        })
    }

    /// Link every registry document into `destination`.
    ///
    /// Per-entry failures are reported, never propagated.
    pub fn sync(&self, registry: &ResolvedRegistry, destination: &Path) -> SyncReport {
        let mut report = SyncReport::new(destination, self.options.dry_run);

        let mut manifest = match self.load_manifest(destination) {
            Ok(manifest) => manifest.unwrap_or_default(),
            Err(error) => {
                tracing::warn!(error = %error, "Refusing to sync without a usable manifest");
                report.errors.push(error);
                return report;
            }
        };

        let lineages = registry_lineages(registry);
        let mut expected = Vec::with_capacity(registry.len());
        for document in registry.iter() {
            let relative = document.relative_target();
            let target = destination.join(&relative);
            let outcome = self.sync_entry(
                document,
                &relative,
                destination,
                registry,
                &lineages,
                &mut manifest,
            );

            match &outcome {
                EntryOutcome::Collision => tracing::warn!(
                    target = %target.display(),
                    id = %document.id,
                    "Destination occupied by content not created here, skipped"
                ),
                EntryOutcome::Failed { error } => tracing::warn!(error = %error, "Link failed"),
                other => tracing::debug!(target = %target.display(), outcome = ?other, "Synced entry"),
            }

            report.entries.push(SyncEntry {
                target_path: target,
                document_id: document.id.clone(),
                group: document.group_key(),
                outcome,
            });
            expected.push(relative);
        }

        if self.options.prune {
            self.prune(destination, &expected, registry, &lineages, &mut manifest, &mut report);
        }

        if !self.options.dry_run
            && let Err(e) = manifest.save(destination)
        {
            report.errors.push(FilesystemOperationError::new(
                LinkManifest::path(destination),
                FsOperation::WriteManifest,
                e,
            ));
        }

        let totals = report.totals();
        tracing::info!(
            destination = %destination.display(),
            created = totals.created,
            replaced = totals.replaced,
            unchanged = totals.unchanged,
            collisions = totals.skipped_collision,
            pruned = totals.pruned,
            failed = totals.failed,
            dry_run = self.options.dry_run,
            "Sync complete"
        );
        report
    }

    fn sync_entry(
        &self,
        document: &CapabilityDocument,
        relative: &Path,
        destination: &Path,
        registry: &ResolvedRegistry,
        lineages: &HashSet<String>,
        manifest: &mut LinkManifest,
    ) -> EntryOutcome {
        if symlinked_ancestor(destination, relative).is_some() {
            return EntryOutcome::Collision;
        }

        let target = &destination.join(relative);

        let state = match inspect(target) {
            Ok(state) => state,
            Err(e) => {
                return EntryOutcome::Failed {
                    error: FilesystemOperationError::new(target, FsOperation::Inspect, e),
                };
            }
        };

        if state == TargetState::Missing {
            if self.options.dry_run {
                return EntryOutcome::Created {
                    link_type: self.options.mode.link_type(),
                };
            }
            return match self.materialize(document, relative, destination, manifest) {
                Ok(entry) => {
                    let link_type = entry.link_type;
                    manifest.upsert(entry);
                    EntryOutcome::Created { link_type }
                }
                Err(error) => EntryOutcome::Failed { error },
            };
        }

        let recorded = manifest.entry(relative);
        if let Some(entry) = recorded
            && !lineages.contains(&entry.lineage)
        {
            tracing::debug!(
                target = %target.display(),
                lineage = %entry.lineage,
                "Entry belongs to another source library"
            );
            return EntryOutcome::Collision;
        }
        let owned = match Self::is_owned(recorded, &state, target, Some(registry)) {
            Ok(owned) => owned,
            Err(e) => {
                return EntryOutcome::Failed {
                    error: FilesystemOperationError::new(target, FsOperation::Inspect, e),
                };
            }
        };
        if !owned {
            return EntryOutcome::Collision;
        }

        match self.is_current(&state, document, target) {
            Ok(true) => {
                if !self.options.dry_run {
                    let digest = match state {
                        TargetState::File => file_digest(target).ok(),
                        _ => None,
                    };
                    let link_type = match state {
                        TargetState::File => LinkType::Copy,
                        _ => LinkType::Symlink,
                    };
                    manifest.upsert(Self::entry_for(document, relative, link_type, digest));
                }
                EntryOutcome::Unchanged
            }
            Ok(false) => {
                if self.options.dry_run {
                    return EntryOutcome::Replaced {
                        link_type: self.options.mode.link_type(),
                    };
                }
                if let Err(e) = std::fs::remove_file(target) {
                    return EntryOutcome::Failed {
                        error: FilesystemOperationError::new(target, FsOperation::Remove, e),
                    };
                }
                manifest.remove(relative);
                match self.materialize(document, relative, destination, manifest) {
                    Ok(entry) => {
                        let link_type = entry.link_type;
                        manifest.upsert(entry);
                        EntryOutcome::Replaced { link_type }
                    }
                    Err(error) => EntryOutcome::Failed { error },
                }
            }
            Err(e) => EntryOutcome::Failed {
                error: FilesystemOperationError::new(&document.source_path, FsOperation::Inspect, e),
            },
        }
    }

    /// The ownership predicate.
    ///
    /// Recorded symlinks must still point at the recorded source; recorded copies
    /// must still hold the recorded bytes. With a registry, an unrecorded symlink
    /// into one of its source roots is adopted.
    fn is_owned(
        recorded: Option<&LinkEntry>,
        state: &TargetState,
        target: &Path,
        registry: Option<&ResolvedRegistry>,
    ) -> io::Result<bool> {
        match state {
            TargetState::Symlink(link) => {
                if let Some(entry) = recorded
                    && entry.link_type == LinkType::Symlink
                    && *link == entry.source_path
                {
                    return Ok(true);
                }
                let Some(registry) = registry else {
                    return Ok(false);
                };
                let resolved = if link.is_absolute() {
                    link.clone()
                } else {
                    target
                        .parent()
                        .map(|p| p.join(link))
                        .unwrap_or_else(|| link.clone())
                };
                let resolved = std::fs::canonicalize(&resolved).unwrap_or(resolved);
                Ok(registry.is_within_sources(&resolved))
            }
            TargetState::File => match recorded {
                Some(entry) if entry.link_type == LinkType::Copy => {
                    let digest = file_digest(target)?;
                    Ok(entry.digest.as_deref() == Some(digest.as_str()))
                }
                _ => Ok(false),
            },
            TargetState::Missing | TargetState::Other => Ok(false),
        }
    }

    /// Whether an owned entry already reflects `document` under the current options.
    fn is_current(
        &self,
        state: &TargetState,
        document: &CapabilityDocument,
        target: &Path,
    ) -> io::Result<bool> {
        match state {
            TargetState::Symlink(link) => {
                Ok(self.options.mode == LinkMode::Symlink && *link == document.source_path)
            }
            TargetState::File => {
                let copy_expected =
                    self.options.mode == LinkMode::Copy || self.options.fallback_to_copy;
                if !copy_expected {
                    return Ok(false);
                }
                Ok(file_digest(target)? == file_digest(&document.source_path)?)
            }
            TargetState::Missing | TargetState::Other => Ok(false),
        }
    }

    fn entry_for(
        document: &CapabilityDocument,
        relative: &Path,
        link_type: LinkType,
        digest: Option<String>,
    ) -> LinkEntry {
        LinkEntry {
            target_path: relative.to_path_buf(),
            source_document_id: document.id.clone(),
            kind: document.kind,
            source_path: document.source_path.clone(),
            lineage: document_lineage(document),
            link_type,
            digest,
        }
    }

    fn materialize(
        &self,
        document: &CapabilityDocument,
        relative: &Path,
        destination: &Path,
        manifest: &mut LinkManifest,
    ) -> Result<LinkEntry, FilesystemOperationError> {
        let target = &destination.join(relative);
        create_parents(destination, relative, manifest).map_err(|e| {
            let parent = target.parent().unwrap_or(destination);
            FilesystemOperationError::new(parent, FsOperation::CreateDir, e)
        })?;

        if self.options.mode == LinkMode::Symlink {
            match create_symlink(&document.source_path, target) {
                Ok(()) => {
                    return Ok(Self::entry_for(document, relative, LinkType::Symlink, None));
                }
                Err(e) if self.options.fallback_to_copy => {
                    tracing::debug!(
                        target = %target.display(),
                        error = %e,
                        "Symlink failed, falling back to copy"
                    );
                }
                Err(e) => {
                    return Err(FilesystemOperationError::new(target, FsOperation::Symlink, e));
                }
            }
        }

        std::fs::copy(&document.source_path, target)
            .map_err(|e| FilesystemOperationError::new(target, FsOperation::Copy, e))?;
        let digest = file_digest(target)
            .map_err(|e| FilesystemOperationError::new(target, FsOperation::Copy, e))?;
        Ok(Self::entry_for(
            document,
            relative,
            LinkType::Copy,
            Some(digest),
        ))
    }

    fn prune(
        &self,
        destination: &Path,
        expected: &[PathBuf],
        registry: &ResolvedRegistry,
        lineages: &HashSet<String>,
        manifest: &mut LinkManifest,
        report: &mut SyncReport,
    ) {
        // Entries linked from another library are left to that library's syncs.
        let stale: Vec<LinkEntry> = manifest
            .entries
            .iter()
            .filter(|e| !expected.contains(&e.target_path) && lineages.contains(&e.lineage))
            .cloned()
            .collect();

        for entry in stale {
            let target = destination.join(&entry.target_path);
            let owned = inspect(&target).and_then(|state| {
                Self::is_owned(Some(&entry), &state, &target, Some(registry))
                    .map(|owned| owned && state != TargetState::Missing)
            });

            let outcome = match owned {
                Ok(false) => {
                    manifest.remove(&entry.target_path);
                    continue;
                }
                Ok(true) if self.options.dry_run => EntryOutcome::Pruned,
                Ok(true) => match std::fs::remove_file(&target) {
                    Ok(()) => {
                        manifest.remove(&entry.target_path);
                        remove_created_parents(&target, destination, manifest);
                        EntryOutcome::Pruned
                    }
                    Err(e) => EntryOutcome::Failed {
                        error: FilesystemOperationError::new(&target, FsOperation::Remove, e),
                    },
                },
                Err(e) => EntryOutcome::Failed {
                    error: FilesystemOperationError::new(&target, FsOperation::Inspect, e),
                },
            };

            tracing::debug!(target = %target.display(), outcome = ?outcome, "Pruned stale entry");
            report.entries.push(SyncEntry {
                group: group_of(&entry.target_path),
                target_path: target,
                document_id: entry.source_document_id,
                outcome,
            });
        }
    }

    /// Remove every entry this system created in `destination`.
    ///
    /// Only manifest-recorded entries that still match their record are removed.
    /// Without a manifest this is a no-op.
    pub fn unlink(&self, destination: &Path) -> UnlinkReport {
        let mut report = UnlinkReport::new(destination);

        let mut manifest = match self.load_manifest(destination) {
            Ok(Some(manifest)) => manifest,
            Ok(None) => {
                tracing::info!(destination = %destination.display(), "Nothing to unlink");
                return report;
            }
            Err(error) => {
                tracing::warn!(error = %error, "Refusing to unlink without a usable manifest");
                report.errors.push(error);
                return report;
            }
        };

        for entry in manifest.entries.clone() {
            let target = destination.join(&entry.target_path);
            let owned = inspect(&target).and_then(|state| {
                if state == TargetState::Missing {
                    return Ok(None);
                }
                Self::is_owned(Some(&entry), &state, &target, None).map(Some)
            });

            let outcome = match owned {
                Ok(None) => {
                    manifest.remove(&entry.target_path);
                    UnlinkOutcome::Missing
                }
                Ok(Some(false)) => {
                    tracing::warn!(target = %target.display(), "Entry changed since linking, left in place");
                    manifest.remove(&entry.target_path);
                    UnlinkOutcome::Foreign
                }
                Ok(Some(true)) => match std::fs::remove_file(&target) {
                    Ok(()) => {
                        manifest.remove(&entry.target_path);
                        report
                            .removed_dirs
                            .extend(remove_created_parents(&target, destination, &mut manifest));
                        UnlinkOutcome::Removed
                    }
                    Err(e) => {
                        let error = FilesystemOperationError::new(&target, FsOperation::Remove, e);
                        tracing::warn!(error = %error, "Unlink failed");
                        UnlinkOutcome::Failed { error }
                    }
                },
                Err(e) => UnlinkOutcome::Failed {
                    error: FilesystemOperationError::new(&target, FsOperation::Inspect, e),
                },
            };

            report.entries.push(UnlinkEntry {
                target_path: target,
                document_id: entry.source_document_id,
                outcome,
            });
        }

        if let Err(e) = manifest.save(destination) {
            report.errors.push(FilesystemOperationError::new(
                LinkManifest::path(destination),
                FsOperation::WriteManifest,
                e,
            ));
        }

        tracing::info!(
            destination = %destination.display(),
            removed = report.removed(),
            failed = report.failures().count(),
            "Unlink complete"
        );
        report
    }
}
