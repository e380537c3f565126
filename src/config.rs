//! Server configuration file.
//!
//! ```toml
//! [storage]
//! data_dir = "/srv/panel"
//! max_snapshots = 10
//!
//! [monitor]
//! snapshot_interval_ms = 300000
//!
//! [sync]
//! bind_addr = "0.0.0.0:8080"
//! ```
//!
//! Every table and key is optional.

use anyhow::{Context, Result};
use psg_store::{find_config_file, read_config_file, MonitorConfig, StoreConfig};
use psg_sync::SyncConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StoreConfig,
    pub monitor: MonitorConfig,
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Load an explicit file, `panel-guard.toml` in the working directory
    /// if present, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, Path::new("."))
    }

    /// Like [`AppConfig::load`], looking for the default file in `search_dir`.
    ///
    /// Only an explicitly named file is required to exist.
    pub fn load_from(path: Option<&Path>, search_dir: &Path) -> Result<Self> {
        match find_config_file(path, search_dir) {
            Some(path) => read_config_file(&path)
                .with_context(|| format!("failed to load config file {}", path.display())),
            None => Ok(Self::default()),
        }
    }

    /// Apply command line overrides on top of the file.
    pub fn with_overrides(mut self, bind: Option<String>, data_dir: Option<PathBuf>) -> Self {
        if let Some(bind) = bind {
            self.sync.bind_addr = bind;
        }
        if let Some(dir) = data_dir {
            self.storage.data_dir = dir;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psg_store::{load_storage_config, DEFAULT_CONFIG_FILE};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_is_defaults() {
        let config = toml::from_str::<AppConfig>("").unwrap();
        assert_eq!(config.sync.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.storage.max_snapshots, 10);
        assert_eq!(config.monitor.snapshot_interval_ms, 300_000);
    }

    #[test]
    fn test_partial_tables() {
        let config = toml::from_str::<AppConfig>(
            r#"
            [storage]
            data_dir = "/srv/panel"
            max_snapshots = 3

            [[storage.critical_files]]
            name = "index.html"
            kind = "html"

            [monitor]
            check_interval_ms = 1000

            [sync]
            max_request_bytes = 2048
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/panel"));
        assert_eq!(config.storage.state_file, "panel.json");
        assert_eq!(config.storage.max_snapshots, 3);
        assert_eq!(config.storage.critical_files.len(), 1);
        assert_eq!(config.monitor.check_interval_ms, 1000);
        assert_eq!(config.monitor.snapshot_interval_ms, 300_000);
        assert_eq!(config.sync.max_request_bytes, 2048);
        assert_eq!(config.sync.max_stream_message_bytes, 5_000);
    }

    #[test]
    fn test_overrides_win() {
        let config = AppConfig::default()
            .with_overrides(Some("127.0.0.1:9000".into()), Some(PathBuf::from("/tmp/panel")));
        assert_eq!(config.sync.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/panel"));
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("panel-guard.toml");
        fs::write(&path, "[sync]\nbind_addr = \"127.0.0.1:1\"\n").unwrap();
        assert_eq!(AppConfig::load(Some(&path)).unwrap().sync.bind_addr, "127.0.0.1:1");
    }

    #[test]
    fn test_default_file_shares_storage_with_maintenance_tool() {
        let dir = TempDir::new().unwrap();
        assert_eq!(AppConfig::load_from(None, dir.path()).unwrap().storage.max_snapshots, 10);

        fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "[storage]\ndata_dir = \"/srv/panel\"\nmax_snapshots = 3\n\n[monitor]\ncheck_interval_ms = 1000\n",
        )
        .unwrap();

        let config = AppConfig::load_from(None, dir.path()).unwrap();
        assert_eq!(config.storage.max_snapshots, 3);
        assert_eq!(config.monitor.check_interval_ms, 1000);

        let storage = load_storage_config(None, dir.path()).unwrap();
        assert_eq!(storage.data_dir, config.storage.data_dir);
        assert_eq!(storage.max_snapshots, config.storage.max_snapshots);
    }

    #[test]
    fn test_rejects_bad_types() {
        assert!(toml::from_str::<AppConfig>("[sync]\nmax_request_bytes = \"big\"\n").is_err());
    }
}
