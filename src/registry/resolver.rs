//! Conflict resolution between roots that define the same capability id.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::document::{CapabilityDocument, CapabilityKind};

/// One override decision: the winner and every document it shadowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideRecord {
    pub kind: CapabilityKind,
    pub id: String,
    pub winning_source_path: PathBuf,
    pub shadowed_source_paths: Vec<PathBuf>,
}

/// De-duplicated documents, addressable by `(kind, id)`.
#[derive(Debug, Clone, Default)]
pub struct ResolvedRegistry {
    agents: BTreeMap<String, CapabilityDocument>,
    commands: BTreeMap<String, CapabilityDocument>,
    source_roots: Vec<PathBuf>,
}

impl ResolvedRegistry {
    pub fn with_source_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.source_roots = roots;
        self
    }

    fn map(&self, kind: CapabilityKind) -> &BTreeMap<String, CapabilityDocument> {
        match kind {
            CapabilityKind::Agent => &self.agents,
            CapabilityKind::Command => &self.commands,
        }
    }

    pub fn get(&self, kind: CapabilityKind, id: &str) -> Option<&CapabilityDocument> {
        self.map(kind).get(id)
    }

    /// Documents of one kind in id order.
    pub fn documents(&self, kind: CapabilityKind) -> impl Iterator<Item = &CapabilityDocument> {
        self.map(kind).values()
    }

    /// All documents, agents first, each kind in id order.
    pub fn iter(&self) -> impl Iterator<Item = &CapabilityDocument> {
        self.agents.values().chain(self.commands.values())
    }

    pub fn len(&self) -> usize {
        self.agents.len() + self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.commands.is_empty()
    }

    /// Canonical roots the documents were loaded from.
    pub fn source_roots(&self) -> &[PathBuf] {
        &self.source_roots
    }

    /// True when `path` lies inside one of the source roots.
    pub fn is_within_sources(&self, path: &Path) -> bool {
        self.source_roots.iter().any(|root| path.starts_with(root))
    }
}

pub struct ConflictResolver;

impl ConflictResolver {
    /// Merge documents so each `(kind, id)` appears once.
    ///
    /// Highest trust wins; ties go to the earliest root, then to the smallest source
    /// path. The result does not depend on the order of `documents`.
    pub fn resolve(
        documents: Vec<CapabilityDocument>,
    ) -> (ResolvedRegistry, Vec<OverrideRecord>) {
        let mut groups: BTreeMap<(CapabilityKind, String), Vec<CapabilityDocument>> =
            BTreeMap::new();
        for document in documents {
            groups
                .entry((document.kind, document.id.clone()))
                .or_default()
                .push(document);
        }

        let mut registry = ResolvedRegistry::default();
        let mut overrides = Vec::new();

        for ((kind, id), mut candidates) in groups {
            candidates.sort_by(|a, b| {
                (Reverse(a.trust_level), a.root_index, &a.source_path).cmp(&(
                    Reverse(b.trust_level),
                    b.root_index,
                    &b.source_path,
                ))
            });

            let mut candidates = candidates.into_iter();
            let Some(winner) = candidates.next() else {
                continue;
            };
            let shadowed: Vec<PathBuf> = candidates.map(|d| d.source_path).collect();

            if !shadowed.is_empty() {
                tracing::info!(
                    kind = %kind,
                    id = %id,
                    winner = %winner.source_path.display(),
                    shadowed = shadowed.len(),
                    "Capability override"
                );
                overrides.push(OverrideRecord {
                    kind,
                    id: id.clone(),
                    winning_source_path: winner.source_path.clone(),
                    shadowed_source_paths: shadowed,
                });
            }

            match kind {
                CapabilityKind::Agent => registry.agents.insert(id, winner),
                CapabilityKind::Command => registry.commands.insert(id, winner),
            };
        }

        (registry, overrides)
    }
}
