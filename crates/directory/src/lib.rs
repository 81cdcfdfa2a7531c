//! The tablet directory: which server owns each hash range of each table.
//!
//! A table's 64-bit key-hash space is covered by disjoint tablets. The
//! [`TabletDirectory`] records every tablet's owner, recovery status and
//! creation watermark, and is the structure the coordinator consults to
//! route requests, drive recovery and split hot ranges.
//!
//! The directory is synchronous and guarded by a single lock; callers share
//! it behind an `Arc`. [`TabletDirectory::serialize`] resolves each owner
//! through a [`ServerRegistry`] and produces a [`Snapshot`] for the wire.

pub mod directory;
pub mod registry;
pub mod snapshot;
pub mod tablet;

pub use directory::{DirectoryError, TabletDirectory};
pub use registry::{RegistryError, ServerRegistry, StaticServerRegistry};
pub use snapshot::{Snapshot, SnapshotEntry, SnapshotError};
pub use tablet::{Tablet, TabletStatus};
