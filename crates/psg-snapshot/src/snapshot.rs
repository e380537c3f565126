//! Snapshot identity and contents.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Directory name prefix for committed snapshots.
pub const SNAPSHOT_PREFIX: &str = "backup-";

const STAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.6fZ";
const STAMP_PARSE_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.fZ";

/// Creation timestamp of a snapshot. Orders oldest to newest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotId(DateTime<Utc>);

impl SnapshotId {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Build an id, truncated to the microsecond resolution used on disk.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let micros = at.timestamp_micros();
        Self(DateTime::from_timestamp_micros(micros).unwrap_or(at))
    }

    /// The smallest id strictly greater than this one.
    pub fn next_after(&self) -> Self {
        Self(self.0 + Duration::microseconds(1))
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn stamp(&self) -> String {
        self.0.format(STAMP_FORMAT).to_string()
    }

    pub fn dir_name(&self) -> String {
        format!("{}{}", SNAPSHOT_PREFIX, self.stamp())
    }

    /// Parse a committed snapshot directory name.
    pub fn parse(dir_name: &str) -> Option<Self> {
        let stamp = dir_name.strip_prefix(SNAPSHOT_PREFIX)?;
        NaiveDateTime::parse_from_str(stamp, STAMP_PARSE_FORMAT)
            .ok()
            .map(|naive| Self(naive.and_utc()))
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// An immutable copy of the critical files taken at one point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub path: PathBuf,
    pub files: BTreeSet<String>,
}

impl Snapshot {
    /// Load the file listing of a committed snapshot directory.
    pub(crate) fn read(id: SnapshotId, path: PathBuf) -> Self {
        let files = match fs::read_dir(&path) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
                .filter_map(|entry| entry.file_name().into_string().ok())
                .collect(),
            Err(e) => {
                warn!(snapshot = %id, error = %e, "Failed to list snapshot contents");
                BTreeSet::new()
            }
        };

        Snapshot { id, path, files }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains(name)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn dir(&self) -> &Path {
        &self.path
    }
}
