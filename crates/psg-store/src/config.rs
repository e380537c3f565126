//! Storage and monitor configuration.
//!
//! Both the server and the maintenance tool read their `[storage]` table
//! from the same TOML file, located by [`find_config_file`].

use crate::error::{Result, StoreError};
use psg_snapshot::{CriticalFile, FileKind, SnapshotConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Looked up in the working directory when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "panel-guard.toml";

/// The explicit path if one was given, otherwise the default file in
/// `search_dir` when it exists.
pub fn find_config_file(explicit: Option<&Path>, search_dir: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => Some(search_dir.join(DEFAULT_CONFIG_FILE)).filter(|path| path.is_file()),
    }
}

/// Read and deserialize a TOML config file.
pub fn read_config_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| StoreError::Config {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct StorageTable {
    storage: StoreConfig,
}

/// The `[storage]` table of the config file, or defaults when no file is
/// found. Other tables are ignored.
pub fn load_storage_config(explicit: Option<&Path>, search_dir: &Path) -> Result<StoreConfig> {
    match find_config_file(explicit, search_dir) {
        Some(path) => Ok(read_config_file::<StorageTable>(&path)?.storage),
        None => Ok(StoreConfig::default()),
    }
}

/// Where the state file and its snapshots live.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the live state file and other critical files.
    pub data_dir: PathBuf,
    /// Snapshot root, relative to `data_dir` unless absolute.
    pub backup_dir: PathBuf,
    /// File name of the panel record inside `data_dir`.
    pub state_file: String,
    /// Files covered by snapshots and scans. The state file is always added.
    pub critical_files: Vec<CriticalFile>,
    /// Snapshots kept after each rotation.
    pub max_snapshots: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let snapshots = SnapshotConfig::default();
        Self {
            data_dir: snapshots.data_dir,
            backup_dir: snapshots.backup_dir,
            state_file: "panel.json".to_string(),
            critical_files: snapshots.critical_files,
            max_snapshots: snapshots.max_snapshots,
        }
    }
}

impl StoreConfig {
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(&self.state_file)
    }

    /// Snapshot settings with the state file guaranteed to be covered.
    pub fn snapshot_config(&self) -> SnapshotConfig {
        let mut critical_files = self.critical_files.clone();
        match critical_files
            .iter_mut()
            .find(|file| file.name == self.state_file)
        {
            Some(file) => file.kind = FileKind::PanelState,
            None => critical_files.insert(0, CriticalFile::panel_state(&self.state_file)),
        }

        SnapshotConfig {
            data_dir: self.data_dir.clone(),
            backup_dir: self.backup_dir.clone(),
            critical_files,
            max_snapshots: self.max_snapshots,
        }
    }
}

/// Builder for storage configuration.
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
        }
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    pub fn backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.backup_dir = dir.into();
        self
    }

    pub fn state_file(mut self, name: impl Into<String>) -> Self {
        self.config.state_file = name.into();
        self
    }

    pub fn critical_files(mut self, files: Vec<CriticalFile>) -> Self {
        self.config.critical_files = files;
        self
    }

    pub fn max_snapshots(mut self, max: usize) -> Self {
        self.config.max_snapshots = max;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Cadence of the background integrity monitor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// How often to take a snapshot (in milliseconds).
    pub snapshot_interval_ms: u64,
    /// How often to scan critical files for corruption (in milliseconds).
    pub check_interval_ms: u64,
    /// Take a snapshot as soon as the monitor starts.
    pub snapshot_on_start: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_ms: 5 * 60 * 1000,
            check_interval_ms: 5 * 60 * 1000,
            snapshot_on_start: true,
        }
    }
}

impl MonitorConfig {
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms.max(1))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(1))
    }
}

/// Builder for monitor configuration.
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MonitorConfig::default(),
        }
    }

    pub fn snapshot_interval(mut self, ms: u64) -> Self {
        self.config.snapshot_interval_ms = ms;
        self
    }

    pub fn check_interval(mut self, ms: u64) -> Self {
        self.config.check_interval_ms = ms;
        self
    }

    pub fn snapshot_on_start(mut self, enabled: bool) -> Self {
        self.config.snapshot_on_start = enabled;
        self
    }

    pub fn build(self) -> MonitorConfig {
        self.config
    }
}

impl Default for MonitorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
