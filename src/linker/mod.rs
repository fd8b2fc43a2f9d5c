//! Projection of a resolved registry into a destination environment.
//!
//! Every entry the linker creates is recorded in a manifest at the destination
//! root. Anything not recorded there, or changed since it was recorded, is
//! treated as user content and never overwritten or removed.

mod manifest;
mod report;
mod sync;

pub use manifest::{
    LinkEntry, LinkManifest, LinkType, MANIFEST_FILE, MANIFEST_VERSION, file_digest, lineage_of,
};
pub use report::{
    EntryOutcome, FilesystemOperationError, FsOperation, OutcomeCounts, SyncEntry, SyncReport,
    UnlinkEntry, UnlinkOutcome, UnlinkReport, group_of,
};
pub use sync::{LinkMode, Linker, SyncOptions};
