//! Prelude module for convenient imports.
//!
//! ```rust
//! use agent_link::prelude::*;
//! ```

pub use crate::Error;
pub use crate::Result;

// Registry
pub use crate::registry::{
    CapabilityDocument, CapabilityKind, ConflictResolver, LoadedRegistry, RegistryLoader,
    ResolvedRegistry, RootSpec,
};

// Linker
pub use crate::linker::{LinkMode, Linker, SyncOptions, SyncReport, UnlinkReport};

// Invocation
pub use crate::invocation::{InvocationRequest, InvocationResult, InvocationRouter};

// Common
pub use crate::common::SourceType;
