//! Snapshot creation, listing, pruning and restore.

use crate::critical::{is_plain_file_name, CriticalFile, FileKind, FileStatus};
use crate::error::SnapshotError;
use crate::snapshot::{Snapshot, SnapshotId};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

const STAGING_PREFIX: &str = ".staging-";
const TRASH_PREFIX: &str = ".trash-";

/// Configuration for snapshot management.
#[derive(Clone, Debug)]
pub struct SnapshotConfig {
    /// Directory holding the live critical files.
    pub data_dir: PathBuf,

    /// Snapshot root. Relative paths are resolved against `data_dir`.
    pub backup_dir: PathBuf,

    /// Files copied into every snapshot.
    pub critical_files: Vec<CriticalFile>,

    /// Maximum number of snapshots kept by [`SnapshotStore::rotate`].
    pub max_snapshots: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        SnapshotConfig {
            data_dir: PathBuf::from("."),
            backup_dir: PathBuf::from("_backups"),
            critical_files: CriticalFile::defaults(),
            max_snapshots: 10,
        }
    }
}

impl SnapshotConfig {
    /// Absolute (or data-dir relative) location of the snapshot root.
    pub fn backup_path(&self) -> PathBuf {
        if self.backup_dir.is_absolute() {
            self.backup_dir.clone()
        } else {
            self.data_dir.join(&self.backup_dir)
        }
    }
}

/// Manages timestamped snapshots of the critical files.
///
/// All mutating operations are serialized on an internal lock which also
/// remembers the last issued id, so ids are strictly increasing even when
/// several snapshots are taken within the same microsecond.
pub struct SnapshotStore {
    config: SnapshotConfig,
    backup_path: PathBuf,
    last_id: Mutex<Option<SnapshotId>>,
}

impl SnapshotStore {
    /// Create a snapshot store. No I/O happens until the first operation.
    pub fn new(config: SnapshotConfig) -> Result<Self, SnapshotError> {
        if let Some(bad) = config
            .critical_files
            .iter()
            .find(|file| !is_plain_file_name(&file.name))
        {
            return Err(SnapshotError::InvalidFileName(bad.name.clone()));
        }

        let backup_path = config.backup_path();
        Ok(SnapshotStore {
            config,
            backup_path,
            last_id: Mutex::new(None),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_path
    }

    pub fn critical_files(&self) -> &[CriticalFile] {
        &self.config.critical_files
    }

    /// Path of the live copy of a file.
    pub fn live_path(&self, name: &str) -> PathBuf {
        self.config.data_dir.join(name)
    }

    /// Copy every present, healthy critical file into a new snapshot.
    ///
    /// Missing files are skipped silently. Files that fail their content
    /// check or cannot be copied are logged and skipped. Only failing to
    /// create or commit the snapshot directory itself is an error.
    pub fn create_snapshot(&self) -> Result<Snapshot, SnapshotError> {
        let mut last_id = self.last_id.lock();
        self.create_locked(&mut last_id)
    }

    /// Create a snapshot, then prune down to the configured maximum.
    pub fn rotate(&self) -> Result<Snapshot, SnapshotError> {
        let mut last_id = self.last_id.lock();
        let snapshot = self.create_locked(&mut last_id)?;
        self.prune_locked(self.config.max_snapshots);
        Ok(snapshot)
    }

    /// All committed snapshots, newest first.
    pub fn list_snapshots(&self) -> Vec<Snapshot> {
        let _guard = self.last_id.lock();
        self.scan()
    }

    /// The newest committed snapshot, if any.
    pub fn latest(&self) -> Option<Snapshot> {
        self.list_snapshots().into_iter().next()
    }

    /// Delete every snapshot beyond the newest `max_retained`, oldest first.
    ///
    /// Returns the number of snapshots removed.
    pub fn prune_snapshots(&self, max_retained: usize) -> usize {
        let _guard = self.last_id.lock();
        self.prune_locked(max_retained)
    }

    /// Restore one file from the newest snapshot holding a healthy copy of it.
    ///
    /// Returns `false` if no snapshot contains a usable copy or the copy fails.
    pub fn restore_latest_file(&self, name: &str) -> bool {
        if !is_plain_file_name(name) {
            warn!(file = name, "Refusing to restore a path outside the data directory");
            return false;
        }

        let kind = self.kind_of(name);
        let _guard = self.last_id.lock();

        for snapshot in self.scan().into_iter().filter(|s| s.contains(name)) {
            let contents = match fs::read(snapshot.file_path(name)) {
                Ok(contents) => contents,
                Err(e) => {
                    warn!(snapshot = %snapshot.id, file = name, error = %e, "Unreadable snapshot copy");
                    continue;
                }
            };

            if let Err(e) = kind.inspect(&contents) {
                warn!(snapshot = %snapshot.id, file = name, error = %e, "Snapshot copy is corrupted, searching older snapshots");
                continue;
            }

            return match write_atomic(&self.live_path(name), &contents) {
                Ok(()) => {
                    info!(snapshot = %snapshot.id, file = name, "File restored from snapshot");
                    true
                }
                Err(e) => {
                    error!(snapshot = %snapshot.id, file = name, error = %e, "Failed to restore file");
                    false
                }
            };
        }

        error!(file = name, "No snapshot holds a usable copy");
        false
    }

    /// Restore every critical file from the newest non-empty snapshot.
    ///
    /// Returns the number of files restored.
    pub fn restore_all(&self) -> usize {
        let _guard = self.last_id.lock();

        let Some(snapshot) = self.scan().into_iter().find(|s| !s.is_empty()) else {
            error!("No snapshot available for restore");
            return 0;
        };

        let mut restored = 0;
        for file in &self.config.critical_files {
            if !snapshot.contains(&file.name) {
                continue;
            }

            let result = fs::read(snapshot.file_path(&file.name))
                .and_then(|contents| write_atomic(&self.live_path(&file.name), &contents));

            match result {
                Ok(()) => {
                    info!(snapshot = %snapshot.id, file = %file.name, "Restored");
                    restored += 1;
                }
                Err(e) => error!(snapshot = %snapshot.id, file = %file.name, error = %e, "Failed to restore"),
            }
        }

        info!(snapshot = %snapshot.id, restored, "Restore complete");
        restored
    }

    /// Check the live copy of one critical file.
    pub fn inspect(&self, file: &CriticalFile) -> FileStatus {
        file.inspect_in(&self.config.data_dir)
    }

    /// Check the live copy of every critical file.
    pub fn inspect_all(&self) -> Vec<(CriticalFile, FileStatus)> {
        self.config
            .critical_files
            .iter()
            .map(|file| (file.clone(), self.inspect(file)))
            .collect()
    }

    fn kind_of(&self, name: &str) -> FileKind {
        self.config
            .critical_files
            .iter()
            .find(|file| file.name == name)
            .map(|file| file.kind)
            .unwrap_or_default()
    }

    fn create_locked(&self, last_id: &mut Option<SnapshotId>) -> Result<Snapshot, SnapshotError> {
        fs::create_dir_all(&self.backup_path).map_err(SnapshotError::io(&self.backup_path))?;

        let previous = match *last_id {
            Some(id) => Some(id),
            None => self.scan().first().map(|s| s.id),
        };
        let mut id = SnapshotId::now();
        if let Some(previous) = previous {
            if id <= previous {
                id = previous.next_after();
            }
        }
        *last_id = Some(id);

        let staging = self.backup_path.join(format!("{}{}", STAGING_PREFIX, id.stamp()));
        fs::create_dir_all(&staging).map_err(SnapshotError::io(&staging))?;

        let mut files = BTreeSet::new();
        for file in &self.config.critical_files {
            let source = self.live_path(&file.name);
            let contents = match fs::read(&source) {
                Ok(contents) => contents,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    error!(file = %file.name, error = %e, "Failed to read file for snapshot");
                    continue;
                }
            };

            if let Err(e) = file.kind.inspect(&contents) {
                warn!(file = %file.name, error = %e, "Not snapshotting corrupted file");
                continue;
            }

            match fs::write(staging.join(&file.name), &contents) {
                Ok(()) => {
                    files.insert(file.name.clone());
                }
                Err(e) => error!(file = %file.name, error = %e, "Failed to copy file into snapshot"),
            }
        }

        let path = self.backup_path.join(id.dir_name());
        if let Err(e) = fs::rename(&staging, &path) {
            let _ = fs::remove_dir_all(&staging);
            return Err(SnapshotError::Io { path, source: e });
        }

        info!(snapshot = %id, files = files.len(), "Snapshot created");
        Ok(Snapshot { id, path, files })
    }

    fn prune_locked(&self, max_retained: usize) -> usize {
        self.sweep_leftovers();

        let mut removed = 0;
        for snapshot in self.scan().iter().skip(max_retained).rev() {
            match self.discard(snapshot) {
                Ok(()) => {
                    info!(snapshot = %snapshot.id, "Snapshot pruned");
                    removed += 1;
                }
                Err(e) => warn!(snapshot = %snapshot.id, error = %e, "Failed to prune snapshot"),
            }
        }
        removed
    }

    /// Take a snapshot out of the listing with one rename, then delete it.
    fn discard(&self, snapshot: &Snapshot) -> io::Result<()> {
        let trash = self
            .backup_path
            .join(format!("{}{}", TRASH_PREFIX, snapshot.id.stamp()));
        fs::rename(&snapshot.path, &trash)?;

        if let Err(e) = fs::remove_dir_all(&trash) {
            warn!(path = %trash.display(), error = %e, "Pruned snapshot left on disk");
        }
        Ok(())
    }

    /// Remove staging and trash directories left behind by a crash.
    fn sweep_leftovers(&self) {
        let Ok(entries) = fs::read_dir(&self.backup_path) else {
            return;
        };

        for entry in entries.filter_map(Result::ok) {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(STAGING_PREFIX) || name.starts_with(TRASH_PREFIX) {
                debug!(path = %entry.path().display(), "Removing leftover snapshot directory");
                let _ = fs::remove_dir_all(entry.path());
            }
        }
    }

    fn scan(&self) -> Vec<Snapshot> {
        let entries = match fs::read_dir(&self.backup_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                error!(path = %self.backup_path.display(), error = %e, "Failed to list snapshots");
                return Vec::new();
            }
        };

        let mut snapshots: Vec<Snapshot> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| {
                let id = SnapshotId::parse(entry.file_name().to_str()?)?;
                Some(Snapshot::read(id, entry.path()))
            })
            .collect();

        snapshots.sort_by(|a, b| b.id.cmp(&a.id));
        snapshots
    }
}

/// Replace `path` with `contents` through a temporary file and a rename.
///
/// Readers see either the old contents or the new contents, never a mix.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
