//! # psg-store
//!
//! Ownership of the single authoritative panel record.
//!
//! - [`StateStore`] - load-with-repair and validated, snapshotted writes
//! - [`IntegrityMonitor`] - periodic snapshots and corruption scans
//! - [`maintenance`] - the system integrity report used by operators
//!
//! ## Lifecycle of the state file
//!
//! ```text
//! absent ──load──▶ valid (defaults written)
//! valid ──external edit / torn file──▶ corrupted (detected on next load or scan)
//! corrupted ──snapshot restore──▶ repaired
//! corrupted ──no usable snapshot──▶ defaults served in memory, file left untouched
//! ```

pub mod config;
pub mod error;
pub mod maintenance;
pub mod monitor;
pub mod state;

pub use config::{
    find_config_file, load_storage_config, read_config_file, MonitorConfig, MonitorConfigBuilder,
    StoreConfig, StoreConfigBuilder, DEFAULT_CONFIG_FILE,
};
pub use error::StoreError;
pub use maintenance::{check_system, IntegrityCheck, IntegrityReport};
pub use monitor::{IntegrityMonitor, MonitorHandle, ScanReport};
pub use state::{LoadOutcome, LoadState, StateStore};
