//! The authoritative panel record on disk.

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use parking_lot::Mutex;
use psg_core::{validator, CorruptionError, PanelRecord};
use psg_snapshot::{write_atomic, SnapshotStore};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// How a load call obtained its record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// The file was absent and defaults were written.
    Created,
    /// The file was present and valid.
    Valid,
    /// The file was corrupted and restored from a snapshot.
    Repaired,
    /// The file was corrupted and no snapshot could restore it.
    /// Defaults are returned but not written.
    Defaulted,
}

/// A loaded record together with how it was obtained.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadOutcome {
    pub record: PanelRecord,
    pub state: LoadState,
}

/// Owns the single panel record.
///
/// Loads and writes are serialized on one lock so that a repair can never
/// interleave with a write. The lock covers file I/O only.
pub struct StateStore {
    path: PathBuf,
    file_name: String,
    snapshots: Arc<SnapshotStore>,
    lock: Mutex<()>,
}

impl StateStore {
    /// Create a store over an existing snapshot store.
    pub fn new(config: &StoreConfig, snapshots: Arc<SnapshotStore>) -> Self {
        Self {
            path: config.state_path(),
            file_name: config.state_file.clone(),
            snapshots,
            lock: Mutex::new(()),
        }
    }

    /// Create a store and the snapshot store it uses.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let snapshots = SnapshotStore::new(config.snapshot_config())?;
        Ok(Self::new(config, Arc::new(snapshots)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn snapshots(&self) -> &Arc<SnapshotStore> {
        &self.snapshots
    }

    /// Load the record, repairing or defaulting as needed. Never fails.
    pub fn load(&self) -> PanelRecord {
        self.load_outcome().record
    }

    /// Load the record and report which path produced it.
    pub fn load_outcome(&self) -> LoadOutcome {
        let _guard = self.lock.lock();

        let err = match self.read() {
            Ok(Some(record)) => {
                return LoadOutcome {
                    record,
                    state: LoadState::Valid,
                }
            }
            Ok(None) => return self.create_default(),
            Err(err) => err,
        };

        warn!(path = %self.path.display(), error = %err, "Panel record corrupted, restoring from snapshot");

        if self.snapshots.restore_latest_file(&self.file_name) {
            match self.read() {
                Ok(Some(record)) => {
                    info!(path = %self.path.display(), "Panel record repaired");
                    return LoadOutcome {
                        record,
                        state: LoadState::Repaired,
                    };
                }
                Ok(None) => warn!("Panel record vanished after restore"),
                Err(e) => warn!(error = %e, "Restored panel record is still unusable"),
            }
        }

        error!(path = %self.path.display(), "No usable snapshot, serving default record");
        LoadOutcome {
            record: PanelRecord::default(),
            state: LoadState::Defaulted,
        }
    }

    /// Validate, snapshot, then atomically replace the record.
    ///
    /// Invalid records are rejected before any I/O.
    pub fn write(&self, record: &PanelRecord) -> Result<()> {
        if let Err(e) = validator::check_record(record) {
            warn!(error = %e, "Rejected invalid panel record");
            return Err(e.into());
        }
        let bytes = serde_json::to_vec_pretty(record)?;

        let _guard = self.lock.lock();

        if let Err(e) = self.snapshots.rotate() {
            warn!(error = %e, "Pre-write snapshot failed");
        }

        write_atomic(&self.path, &bytes).map_err(|source| {
            error!(path = %self.path.display(), error = %source, "Failed to save panel record");
            StoreError::Io {
                path: self.path.clone(),
                source,
            }
        })?;

        info!(path = %self.path.display(), "Panel record saved");
        Ok(())
    }

    /// Validate untyped JSON, then write it.
    pub fn write_value(&self, value: &Value) -> Result<PanelRecord> {
        let record = PanelRecord::from_value(value).map_err(|e| {
            warn!(error = %e, "Rejected invalid panel record");
            StoreError::from(e)
        })?;
        self.write(&record)?;
        Ok(record)
    }

    /// Read the live file without repairing it. `Ok(None)` means absent.
    pub fn inspect(&self) -> std::result::Result<Option<PanelRecord>, CorruptionError> {
        self.read()
    }

    /// Run the repair path if the live file is corrupted.
    ///
    /// Returns `None` when the file is healthy or absent.
    pub fn repair_if_corrupted(&self) -> Option<LoadOutcome> {
        match self.inspect() {
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Integrity scan found a corrupted panel record");
                Some(self.load_outcome())
            }
        }
    }

    fn read(&self) -> std::result::Result<Option<PanelRecord>, CorruptionError> {
        match fs::read(&self.path) {
            Ok(bytes) => PanelRecord::from_json(&bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn create_default(&self) -> LoadOutcome {
        let record = PanelRecord::default();
        let written = serde_json::to_vec_pretty(&record)
            .map_err(std::io::Error::from)
            .and_then(|bytes| write_atomic(&self.path, &bytes));

        match written {
            Ok(()) => info!(path = %self.path.display(), "Created default panel record"),
            Err(e) => error!(path = %self.path.display(), error = %e, "Failed to write default panel record"),
        }

        LoadOutcome {
            record,
            state: LoadState::Created,
        }
    }
}
