//! # agent-link
//!
//! Capability registry, linker and invocation router for libraries of markdown
//! agent and command documents.
//!
//! A source repository lays out capability documents as:
//!
//! ```text
//! agents/{core,orchestrators,specialized,universal}/**/*.md
//! commands/*.md
//! ```
//!
//! This crate discovers those documents, resolves id conflicts between roots,
//! links them into a destination environment (usually `~/.claude`), and resolves
//! `@agent-<name>` / `/<name>` references to a single document.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agent_link::{Linker, RegistryLoader, RootSpec};
//!
//! fn main() -> Result<(), agent_link::Error> {
//!     let loaded = RegistryLoader::new().load(&RootSpec::repository("./library", 0))?;
//!     let (registry, overrides) = loaded.resolve();
//!     for record in &overrides {
//!         println!("{} shadows {} other(s)", record.id, record.shadowed_source_paths.len());
//!     }
//!
//!     let report = Linker::new().sync(&registry, "/home/me/.claude".as_ref());
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod common;
pub mod config;
pub mod invocation;
pub mod linker;
pub mod observability;
pub mod prelude;
pub mod registry;

use std::path::PathBuf;

pub use common::SourceType;
pub use config::{ConfigError, EnvOverrides, RootSettings, Settings, SettingsLoader};
pub use invocation::{
    DEFAULT_ARGUMENTS_PHRASE, InvocationRequest, InvocationResult, InvocationRouter,
    ReferenceToken,
};
pub use linker::{
    EntryOutcome, FilesystemOperationError, LinkEntry, LinkManifest, LinkMode, LinkType, Linker,
    SyncOptions, SyncReport, UnlinkOutcome, UnlinkReport,
};
pub use observability::{TracingConfig, TracingLevel, init_tracing};
pub use registry::{
    AgentCategory, CapabilityDocument, CapabilityKind, ConflictResolver, LoadWarning,
    LoadedRegistry, OverrideRecord, ParseWarning, ParsedDocument, RegistryLoader,
    ResolvedRegistry, RootSpec,
};

/// Error type for agent-link operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No capability documents could be found, or the primary root is missing.
    #[error("No capability documents found (roots: {})", display_paths(roots))]
    RegistryEmpty { roots: Vec<PathBuf> },

    /// Reference token did not resolve to any document.
    #[error("Unknown reference '{token}'{}", suggestion_suffix(suggestions))]
    UnknownReference {
        token: String,
        suggestions: Vec<String>,
    },

    /// Reference token names more than one document exactly.
    #[error("Ambiguous reference '{token}': matches {}", candidates.join(", "))]
    AmbiguousReference {
        token: String,
        candidates: Vec<String>,
    },

    /// Reference token does not follow the `@agent-<name>` or `/<name>` grammar.
    #[error("Invalid reference '{0}': expected '@agent-<name>' or '/<name>'")]
    InvalidReference(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Destination manifest could not be read or written.
    #[error("Manifest error at {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Settings, roots or manifests are unusable
    Configuration,
    /// Reference tokens that cannot be resolved to exactly one document
    Lookup,
    /// Filesystem access failures
    Filesystem,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::RegistryEmpty { .. }
            | Error::Config(_)
            | Error::Manifest { .. }
            | Error::Json(_) => ErrorCategory::Configuration,

            Error::UnknownReference { .. }
            | Error::AmbiguousReference { .. }
            | Error::InvalidReference(_) => ErrorCategory::Lookup,

            Error::Io(_) => ErrorCategory::Filesystem,
        }
    }

    pub fn is_lookup_error(&self) -> bool {
        self.category() == ErrorCategory::Lookup
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::Io(e) => Error::Io(e),
            config::ConfigError::Serialization(e) => Error::Json(e),
            other => Error::Config(other.to_string()),
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn suggestion_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
