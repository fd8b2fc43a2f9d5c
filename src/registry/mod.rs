//! Capability registry: loading documents from roots and resolving id conflicts.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │    RootSpec     │────▶│  RegistryLoader  │────▶│  LoadedRegistry  │
//! │ (path, kind,    │     │ (front-matter,   │     │ (documents +     │
//! │  trust level)   │     │  warnings)       │     │  warnings)       │
//! └─────────────────┘     └──────────────────┘     └────────┬─────────┘
//!                                                           │
//!                                                           ▼
//!                         ┌──────────────────┐     ┌──────────────────┐
//!                         │ ResolvedRegistry │◀────│ ConflictResolver │
//!                         │ + override log   │     │ (trust, order)   │
//!                         └──────────────────┘     └──────────────────┘
//! ```

mod document;
mod loader;
mod resolver;

pub use document::{AgentCategory, CapabilityDocument, CapabilityKind, normalize_name};
pub use loader::{
    LoadWarning, LoadedRegistry, ParseWarning, ParsedDocument, RegistryLoader, RootSpec,
};
pub use resolver::{ConflictResolver, OverrideRecord, ResolvedRegistry};
