//! # psg-snapshot
//!
//! Point-in-time copies of the critical file set.
//!
//! A snapshot is one directory under the backup root, named with a sortable
//! creation timestamp, holding copies of every critical file that was present
//! and healthy when it was taken:
//!
//! ```text
//! _backups/
//!   backup-2026-10-19T12-00-00.000001Z/
//!     panel.json
//!     index.html
//!   backup-2026-10-19T12-05-00.000001Z/
//!     panel.json
//! ```
//!
//! Snapshots are built in a staging directory and renamed into place, and
//! pruned by renaming out of the listing before deletion, so a listing never
//! observes a half-written or half-deleted snapshot.

mod critical;
mod error;
mod snapshot;
mod store;

pub use critical::{is_plain_file_name, CriticalFile, FileKind, FileStatus};
pub use error::SnapshotError;
pub use snapshot::{Snapshot, SnapshotId, SNAPSHOT_PREFIX};
pub use store::{write_atomic, SnapshotConfig, SnapshotStore};
