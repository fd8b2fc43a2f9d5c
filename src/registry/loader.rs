//! Registry loading: scans roots and parses capability documents.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::document::{AgentCategory, CapabilityDocument, CapabilityKind, normalize_name};
use super::resolver::{ConflictResolver, OverrideRecord, ResolvedRegistry};
use crate::common::{
    SplitDocument, is_markdown, markdown_files, parse_frontmatter, scan_key, split_frontmatter,
};

/// One ordered input root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSpec {
    pub path: PathBuf,
    pub kind: CapabilityKind,
    pub trust_level: i32,
    /// Source repository this root was expanded from, if any.
    pub repository: Option<PathBuf>,
}

impl RootSpec {
    pub fn new(path: impl Into<PathBuf>, kind: CapabilityKind, trust_level: i32) -> Self {
        Self {
            path: path.into(),
            kind,
            trust_level,
            repository: None,
        }
    }

    pub fn agents(path: impl Into<PathBuf>, trust_level: i32) -> Self {
        Self::new(path, CapabilityKind::Agent, trust_level)
    }

    pub fn commands(path: impl Into<PathBuf>, trust_level: i32) -> Self {
        Self::new(path, CapabilityKind::Command, trust_level)
    }

    /// Expand a source repository into its `agents/` and `commands/` roots.
    pub fn repository(path: impl AsRef<Path>, trust_level: i32) -> Vec<Self> {
        let path = path.as_ref();
        CapabilityKind::ALL
            .into_iter()
            .map(|kind| Self {
                repository: Some(path.to_path_buf()),
                ..Self::new(path.join(kind.subdir()), kind, trust_level)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DocumentFrontmatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Non-fatal front-matter problem for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of parsing one file. A warning still carries a usable document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedDocument {
    Ok(CapabilityDocument),
    Warning(CapabilityDocument, ParseWarning),
}

impl ParsedDocument {
    pub fn document(&self) -> &CapabilityDocument {
        match self {
            Self::Ok(doc) | Self::Warning(doc, _) => doc,
        }
    }

    pub fn into_parts(self) -> (CapabilityDocument, Option<ParseWarning>) {
        match self {
            Self::Ok(doc) => (doc, None),
            Self::Warning(doc, warning) => (doc, Some(warning)),
        }
    }
}

/// Anything the loader tolerated instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadWarning {
    Parse(ParseWarning),
    /// Agent file outside `core`, `orchestrators`, `specialized` or `universal`.
    UnknownCategory { path: PathBuf },
    MissingRoot { path: PathBuf },
    Unreadable { path: PathBuf, reason: String },
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(w) => write!(f, "{}: {}", w.path.display(), w.reason),
            Self::UnknownCategory { path } => {
                write!(f, "{}: agent is outside a known category, skipped", path.display())
            }
            Self::MissingRoot { path } => write!(f, "{}: root does not exist", path.display()),
            Self::Unreadable { path, reason } => write!(f, "{}: {}", path.display(), reason),
        }
    }
}

/// Documents and warnings gathered from all roots, before conflict resolution.
#[derive(Debug, Clone, Default)]
pub struct LoadedRegistry {
    pub documents: Vec<CapabilityDocument>,
    pub warnings: Vec<LoadWarning>,
    /// Canonical paths of the roots that exist.
    pub roots: Vec<PathBuf>,
}

impl LoadedRegistry {
    pub fn parse_warnings(&self) -> impl Iterator<Item = &ParseWarning> {
        self.warnings.iter().filter_map(|w| match w {
            LoadWarning::Parse(p) => Some(p),
            _ => None,
        })
    }

    /// Run conflict resolution, keeping the source roots for link adoption.
    pub fn resolve(&self) -> (ResolvedRegistry, Vec<OverrideRecord>) {
        let (registry, overrides) = ConflictResolver::resolve(self.documents.clone());
        (registry.with_source_roots(self.roots.clone()), overrides)
    }
}

#[derive(Debug, Default)]
struct RootScan {
    documents: Vec<CapabilityDocument>,
    warnings: Vec<LoadWarning>,
    canonical_root: Option<PathBuf>,
}

/// Scans roots and builds capability documents. Never writes to disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryLoader;

impl RegistryLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load all roots sequentially.
    pub fn load(&self, roots: &[RootSpec]) -> crate::Result<LoadedRegistry> {
        let scans = roots
            .iter()
            .enumerate()
            .map(|(index, spec)| self.scan_root(index, spec))
            .collect();
        Self::merge(roots, scans)
    }

    /// Load roots in parallel on the blocking pool. Output is identical to [`load`](Self::load).
    pub async fn load_concurrent(&self, roots: &[RootSpec]) -> crate::Result<LoadedRegistry> {
        let loader = *self;
        let handles = roots.iter().cloned().enumerate().map(|(index, spec)| {
            tokio::task::spawn_blocking(move || loader.scan_root(index, &spec))
        });

        let mut scans = Vec::with_capacity(roots.len());
        for joined in futures::future::join_all(handles).await {
            scans.push(
                joined.map_err(|e| crate::Error::Config(format!("Root scan task failed: {}", e)))?,
            );
        }
        Self::merge(roots, scans)
    }

    fn merge(roots: &[RootSpec], scans: Vec<RootScan>) -> crate::Result<LoadedRegistry> {
        let all_roots = || roots.iter().map(|r| r.path.clone()).collect::<Vec<_>>();

        if Self::primary_missing(roots, &scans) {
            return Err(crate::Error::RegistryEmpty { roots: all_roots() });
        }

        let mut loaded = LoadedRegistry::default();
        for scan in scans {
            loaded.documents.extend(scan.documents);
            loaded.warnings.extend(scan.warnings);
            if let Some(root) = scan.canonical_root
                && !loaded.roots.contains(&root)
            {
                loaded.roots.push(root);
            }
        }

        if loaded.documents.is_empty() {
            return Err(crate::Error::RegistryEmpty { roots: all_roots() });
        }

        tracing::info!(
            documents = loaded.documents.len(),
            warnings = loaded.warnings.len(),
            roots = roots.len(),
            "Registry loaded"
        );
        Ok(loaded)
    }

    /// The first source is missing when none of its roots exist.
    ///
    /// A repository counts as one source, so a library with only `commands/`
    /// still loads.
    fn primary_missing(roots: &[RootSpec], scans: &[RootScan]) -> bool {
        let Some(first) = roots.first() else {
            return true;
        };
        !roots
            .iter()
            .zip(scans)
            .enumerate()
            .filter(|(index, (spec, _))| match &first.repository {
                Some(repository) => spec.repository.as_ref() == Some(repository),
                None => *index == 0,
            })
            .any(|(_, (_, scan))| scan.canonical_root.is_some())
    }

    fn scan_root(&self, root_index: usize, spec: &RootSpec) -> RootScan {
        let mut scan = RootScan::default();

        let canonical = match std::fs::canonicalize(&spec.path) {
            Ok(path) if path.is_dir() => path,
            _ => {
                tracing::debug!(root = %spec.path.display(), "Root missing, contributes nothing");
                scan.warnings.push(LoadWarning::MissingRoot {
                    path: spec.path.clone(),
                });
                return scan;
            }
        };

        let files = match markdown_files(&canonical) {
            Ok(files) => files,
            Err(e) => {
                scan.warnings.push(LoadWarning::Unreadable {
                    path: canonical.clone(),
                    reason: e.to_string(),
                });
                scan.canonical_root = Some(canonical);
                return scan;
            }
        };

        for path in files {
            let relative = path.strip_prefix(&canonical).unwrap_or(&path).to_path_buf();

            let category = match spec.kind {
                CapabilityKind::Agent => match Self::agent_category(&relative) {
                    Some(category) => Some(category),
                    None => {
                        tracing::warn!(path = %path.display(), "Agent outside known categories");
                        scan.warnings.push(LoadWarning::UnknownCategory { path });
                        continue;
                    }
                },
                CapabilityKind::Command => None,
            };

            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to read document");
                    scan.warnings.push(LoadWarning::Unreadable {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let parsed =
                self.parse_document(&content, &relative, path, spec, root_index, category);
            let (document, warning) = parsed.into_parts();
            if let Some(warning) = warning {
                tracing::warn!(path = %warning.path.display(), reason = %warning.reason, "Front-matter warning");
                scan.warnings.push(LoadWarning::Parse(warning));
            }
            tracing::debug!(id = %document.id, kind = %document.kind, "Loaded document");
            scan.documents.push(document);
        }

        scan.canonical_root = Some(canonical);
        scan
    }

    fn agent_category(relative: &Path) -> Option<AgentCategory> {
        let mut components = relative.components();
        let first = components.next()?.as_os_str().to_str()?;
        // A file directly under agents/ has no category directory.
        components.next()?;
        AgentCategory::from_dir_name(first)
    }

    /// Parse one document's content. `relative` is the path below the kind root.
    pub fn parse_document(
        &self,
        content: &str,
        relative: &Path,
        source_path: PathBuf,
        spec: &RootSpec,
        root_index: usize,
        category: Option<AgentCategory>,
    ) -> ParsedDocument {
        let fallback_name = relative
            .file_stem()
            .map(|s| normalize_name(&s.to_string_lossy()))
            .unwrap_or_default();

        let mut document = CapabilityDocument {
            id: CapabilityDocument::id_from_relative(relative),
            kind: spec.kind,
            name: fallback_name,
            description: String::new(),
            source_path,
            category,
            content: String::new(),
            root_index,
            trust_level: spec.trust_level,
        };

        let warn = |document: CapabilityDocument, reason: String| {
            let path = document.source_path.clone();
            ParsedDocument::Warning(document, ParseWarning { path, reason })
        };

        if !is_markdown(relative) {
            document.content = content.to_string();
            return warn(document, "not a markdown document".to_string());
        }

        match split_frontmatter(content) {
            SplitDocument::Absent { body } => {
                document.content = body.to_string();
                ParsedDocument::Ok(document)
            }
            SplitDocument::Unterminated => {
                document.content = content.to_string();
                warn(
                    document,
                    "front-matter opened with '---' but never closed".to_string(),
                )
            }
            SplitDocument::Block { yaml, body } => {
                document.content = body.to_string();
                match parse_frontmatter::<DocumentFrontmatter>(yaml) {
                    Ok(fm) => {
                        Self::apply(&mut document, fm.name.as_deref(), fm.description);
                        ParsedDocument::Ok(document)
                    }
                    Err(reason) => {
                        Self::apply(
                            &mut document,
                            scan_key(yaml, "name"),
                            scan_key(yaml, "description").map(str::to_string),
                        );
                        warn(
                            document,
                            format!(
                                "front-matter is not valid YAML, keys recovered per line: {}",
                                reason
                            ),
                        )
                    }
                }
            }
        }
    }

    fn apply(document: &mut CapabilityDocument, name: Option<&str>, description: Option<String>) {
        if let Some(name) = name.map(normalize_name).filter(|n| !n.is_empty()) {
            document.name = name;
        }
        if let Some(description) = description {
            document.description = description.trim().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn parse(content: &str, relative: &str) -> ParsedDocument {
        RegistryLoader::new().parse_document(
            content,
            Path::new(relative),
            PathBuf::from("/src").join(relative),
            &RootSpec::agents("/src", 0),
            0,
            Some(AgentCategory::Core),
        )
    }

    #[test]
    fn test_parse_with_frontmatter() {
        let content = r#"---
name: code-reviewer
description: Expert code reviewer for quality checks
tools: Read, Grep, Glob
---

You are a senior code reviewer.
"#;
        let ParsedDocument::Ok(doc) = parse(content, "core/reviewer.md") else {
            panic!("expected clean parse");
        };
        assert_eq!(doc.id, "core/reviewer");
        assert_eq!(doc.name, "code-reviewer");
        assert_eq!(doc.description, "Expert code reviewer for quality checks");
        assert_eq!(doc.content, "You are a senior code reviewer.\n");
    }

    #[test]
    fn test_parse_without_frontmatter_derives_name() {
        let ParsedDocument::Ok(doc) = parse("Just a prompt", "core/Tech_Lead Orchestrator.md")
        else {
            panic!("expected clean parse");
        };
        assert_eq!(doc.name, "tech-lead-orchestrator");
        assert!(doc.description.is_empty());
        assert_eq!(doc.content, "Just a prompt");
    }

    #[test]
    fn test_parse_unterminated_is_warning() {
        let content = "---\nname: broken\nno closing";
        let ParsedDocument::Warning(doc, warning) = parse(content, "core/broken-file.md") else {
            panic!("expected warning");
        };
        assert_eq!(doc.name, "broken-file");
        assert!(doc.description.is_empty());
        assert_eq!(doc.content, content);
        assert!(warning.reason.contains("never closed"));
        assert_eq!(warning.path, PathBuf::from("/src/core/broken-file.md"));
    }

    #[test]
    fn test_parse_invalid_yaml_recovers_keys() {
        let content = "---\nname: dotnet-webapi-expert\ndescription: Use when: building APIs\n---\nBody";
        let ParsedDocument::Warning(doc, warning) = parse(content, "core/webapi.md") else {
            panic!("expected warning");
        };
        assert_eq!(doc.name, "dotnet-webapi-expert");
        assert_eq!(doc.description, "Use when: building APIs");
        assert_eq!(doc.content, "Body");
        assert!(warning.reason.contains("not valid YAML"));
    }

    #[test]
    fn test_parse_frontmatter_without_name() {
        let content = "---\ndescription: only a description\n---\nBody";
        let ParsedDocument::Ok(doc) = parse(content, "core/fallback.md") else {
            panic!("expected clean parse");
        };
        assert_eq!(doc.name, "fallback");
        assert_eq!(doc.description, "only a description");
    }

    #[test]
    fn test_load_repository() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "agents/core/code-reviewer.md",
            "---\nname: code-reviewer\ndescription: Reviews\n---\nReview.",
        );
        write(dir.path(), "agents/specialized/dotnet/webapi.md", "WebAPI");
        write(dir.path(), "agents/loose.md", "no category");
        write(dir.path(), "agents/misc/other.md", "unknown category");
        write(dir.path(), "agents/README.md", "docs");
        write(dir.path(), "commands/test.md", "Run tests: $ARGUMENTS");

        let loaded = RegistryLoader::new()
            .load(&RootSpec::repository(dir.path(), 0))
            .unwrap();

        let ids: Vec<(CapabilityKind, &str)> = loaded
            .documents
            .iter()
            .map(|d| (d.kind, d.id.as_str()))
            .collect();
        assert_eq!(
            ids,
            vec![
                (CapabilityKind::Agent, "core/code-reviewer"),
                (CapabilityKind::Agent, "specialized/dotnet/webapi"),
                (CapabilityKind::Command, "test"),
            ]
        );
        assert_eq!(
            loaded.documents[1].category,
            Some(AgentCategory::Specialized)
        );
        assert_eq!(
            loaded
                .warnings
                .iter()
                .filter(|w| matches!(w, LoadWarning::UnknownCategory { .. }))
                .count(),
            2
        );
        assert_eq!(loaded.roots.len(), 2);
        assert!(loaded.documents.iter().all(|d| d.source_path.is_absolute()));
    }

    #[test]
    fn test_commands_only_repository_loads() {
        let dir = tempdir().unwrap();
        write(dir.path(), "commands/test.md", "Run tests: $ARGUMENTS");

        let loaded = RegistryLoader::new()
            .load(&RootSpec::repository(dir.path(), 0))
            .unwrap();
        assert_eq!(loaded.documents.len(), 1);
        assert_eq!(loaded.documents[0].kind, CapabilityKind::Command);
        assert_eq!(loaded.roots.len(), 1);
        assert!(
            loaded
                .warnings
                .iter()
                .any(|w| matches!(w, LoadWarning::MissingRoot { path } if path.ends_with("agents")))
        );
    }

    #[test]
    fn test_missing_primary_repository_fails() {
        let dir = tempdir().unwrap();
        let fallback = tempdir().unwrap();
        write(fallback.path(), "commands/test.md", "cmd");

        let mut roots = RootSpec::repository(dir.path().join("missing"), 0);
        roots.extend(RootSpec::repository(fallback.path(), 10));

        let err = RegistryLoader::new().load(&roots).unwrap_err();
        assert!(matches!(err, crate::Error::RegistryEmpty { .. }));
    }

    #[test]
    fn test_missing_primary_kind_root_fails() {
        let dir = tempdir().unwrap();
        let roots = vec![
            RootSpec::agents(dir.path().join("missing"), 0),
            RootSpec::commands(dir.path(), 0),
        ];
        write(dir.path(), "test.md", "cmd");

        let err = RegistryLoader::new().load(&roots).unwrap_err();
        assert!(matches!(err, crate::Error::RegistryEmpty { .. }));
    }

    #[test]
    fn test_missing_secondary_root_is_empty_contribution() {
        let dir = tempdir().unwrap();
        write(dir.path(), "agents/core/a.md", "A");

        let mut roots = RootSpec::repository(dir.path(), 0);
        roots.push(RootSpec::agents(dir.path().join("nowhere"), 5));

        let loaded = RegistryLoader::new().load(&roots).unwrap();
        assert_eq!(loaded.documents.len(), 1);
        assert!(
            loaded
                .warnings
                .iter()
                .any(|w| matches!(w, LoadWarning::MissingRoot { .. }))
        );
    }

    #[test]
    fn test_no_documents_fails() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("agents")).unwrap();
        let err = RegistryLoader::new()
            .load(&RootSpec::repository(dir.path(), 0))
            .unwrap_err();
        assert!(matches!(err, crate::Error::RegistryEmpty { .. }));
    }

    #[test]
    fn test_no_roots_fails() {
        let err = RegistryLoader::new().load(&[]).unwrap_err();
        assert!(matches!(err, crate::Error::RegistryEmpty { .. }));
    }

    #[test]
    fn test_load_is_read_only() {
        let dir = tempdir().unwrap();
        write(dir.path(), "agents/core/a.md", "---\nname: a\n");
        let before: Vec<_> = std::fs::read_dir(dir.path().join("agents/core"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();

        RegistryLoader::new()
            .load(&RootSpec::repository(dir.path(), 0))
            .unwrap();

        let after: Vec<_> = std::fs::read_dir(dir.path().join("agents/core"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_load_concurrent_matches_sequential() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a/agents/core/one.md", "one");
        write(dir.path(), "a/commands/deploy.md", "deploy");
        write(dir.path(), "b/agents/core/one.md", "one override");
        write(dir.path(), "b/agents/universal/two.md", "two");

        let mut roots = RootSpec::repository(dir.path().join("a"), 0);
        roots.extend(RootSpec::repository(dir.path().join("b"), 10));

        let loader = RegistryLoader::new();
        let sequential = loader.load(&roots).unwrap();
        let concurrent = loader.load_concurrent(&roots).await.unwrap();

        assert_eq!(sequential.documents, concurrent.documents);
        assert_eq!(sequential.warnings, concurrent.warnings);
        assert_eq!(sequential.roots, concurrent.roots);
    }
}
