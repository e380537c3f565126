//! Background integrity monitor: periodic snapshots and corruption scans.

use crate::config::MonitorConfig;
use crate::state::{LoadState, StateStore};
use psg_snapshot::{FileStatus, Snapshot};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Result of one corruption scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanReport {
    /// Set when the state file went through the repair path.
    pub state: Option<LoadState>,
    /// Other critical files restored from a snapshot.
    pub restored: Vec<String>,
    /// Files that are corrupted and could not be restored.
    pub still_corrupted: Vec<String>,
}

impl ScanReport {
    /// True when nothing needed repair.
    pub fn is_clean(&self) -> bool {
        self.state.is_none() && self.restored.is_empty() && self.still_corrupted.is_empty()
    }
}

/// Drives snapshots and scans for one state store.
#[derive(Clone)]
pub struct IntegrityMonitor {
    store: Arc<StateStore>,
    config: MonitorConfig,
}

impl IntegrityMonitor {
    pub fn new(store: Arc<StateStore>, config: MonitorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Take a snapshot and prune old ones. Failures are logged.
    pub fn snapshot_now(&self) -> Option<Snapshot> {
        match self.store.snapshots().rotate() {
            Ok(snapshot) => {
                info!(snapshot = %snapshot.id, files = snapshot.file_count(), "Snapshot taken");
                Some(snapshot)
            }
            Err(e) => {
                error!(error = %e, "Snapshot failed");
                None
            }
        }
    }

    /// Check every critical file and repair what is corrupted.
    ///
    /// Missing files are left alone; the state file is recreated on its
    /// next load.
    pub fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();
        let snapshots = self.store.snapshots();

        for (file, status) in snapshots.inspect_all() {
            if file.name == self.store.file_name() {
                if let Some(outcome) = self.store.repair_if_corrupted() {
                    if outcome.state == LoadState::Defaulted {
                        report.still_corrupted.push(file.name.clone());
                    }
                    report.state = Some(outcome.state);
                }
                continue;
            }

            let FileStatus::Corrupted(err) = status else {
                continue;
            };

            warn!(file = %file.name, error = %err, "Corrupted file detected");
            if snapshots.restore_latest_file(&file.name) {
                report.restored.push(file.name);
            } else {
                report.still_corrupted.push(file.name);
            }
        }

        if report.is_clean() {
            debug!("Integrity scan clean");
        } else {
            info!(
                state = ?report.state,
                restored = report.restored.len(),
                still_corrupted = report.still_corrupted.len(),
                "Integrity scan finished"
            );
        }
        report
    }

    /// Run the monitor on the current tokio runtime until shut down.
    pub fn spawn(self) -> MonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            if self.config.snapshot_on_start {
                self.run_blocking(|m| {
                    m.snapshot_now();
                })
                .await;
            }

            let snapshot_every = self.config.snapshot_interval();
            let check_every = self.config.check_interval();
            let mut snapshot_tick = interval_at(Instant::now() + snapshot_every, snapshot_every);
            let mut check_tick = interval_at(Instant::now() + check_every, check_every);
            snapshot_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            check_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                snapshot_interval_ms = snapshot_every.as_millis() as u64,
                check_interval_ms = check_every.as_millis() as u64,
                "Integrity monitor started"
            );

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = snapshot_tick.tick() => {
                        self.run_blocking(|m| {
                            m.snapshot_now();
                        })
                        .await;
                    }
                    _ = check_tick.tick() => {
                        self.run_blocking(|m| {
                            m.scan();
                        })
                        .await;
                    }
                }
            }

            info!("Integrity monitor stopped");
        });

        MonitorHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    async fn run_blocking<F>(&self, work: F)
    where
        F: FnOnce(&IntegrityMonitor) + Send + 'static,
    {
        let monitor = self.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || work(&monitor)).await {
            error!(error = %e, "Integrity task panicked");
        }
    }
}

/// Handle to a running monitor. Dropping it also stops the monitor.
pub struct MonitorHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop the monitor and wait for any in-flight work to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            error!(error = %e, "Integrity monitor task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitorConfigBuilder, StoreConfigBuilder};
    use psg_core::PanelRecord;
    use psg_snapshot::CriticalFile;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> Arc<StateStore> {
        let config = StoreConfigBuilder::new()
            .data_dir(dir.path())
            .critical_files(vec![CriticalFile::html("index.html")])
            .max_snapshots(5)
            .build();
        Arc::new(StateStore::open(&config).unwrap())
    }

    fn record(balance: f64) -> PanelRecord {
        PanelRecord {
            available_balance: balance,
            is_active: true,
            ..Default::default()
        }
    }

    const PAGE: &str = "<!DOCTYPE html><html><body></body></html>";

    #[test]
    fn test_scan_clean() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write(&record(1.0)).unwrap();
        fs::write(dir.path().join("index.html"), PAGE).unwrap();

        let monitor = IntegrityMonitor::new(store, MonitorConfig::default());
        assert!(monitor.scan().is_clean());
    }

    #[test]
    fn test_scan_repairs_state_and_html() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write(&record(42.0)).unwrap();
        fs::write(dir.path().join("index.html"), PAGE).unwrap();

        let monitor = IntegrityMonitor::new(store.clone(), MonitorConfig::default());
        monitor.snapshot_now().unwrap();

        fs::write(store.path(), "{ broken").unwrap();
        fs::write(dir.path().join("index.html"), "<html><body>").unwrap();

        let report = monitor.scan();
        assert_eq!(report.state, Some(LoadState::Repaired));
        assert_eq!(report.restored, vec!["index.html".to_string()]);
        assert!(report.still_corrupted.is_empty());

        assert_eq!(store.load(), record(42.0));
        assert_eq!(fs::read_to_string(dir.path().join("index.html")).unwrap(), PAGE);
    }

    #[test]
    fn test_scan_reports_unrepairable() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "[]").unwrap();

        let monitor = IntegrityMonitor::new(store, MonitorConfig::default());
        let report = monitor.scan();

        assert_eq!(report.state, Some(LoadState::Defaulted));
        assert_eq!(report.still_corrupted, vec!["panel.json".to_string()]);
    }

    #[test]
    fn test_snapshot_now_prunes() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write(&record(1.0)).unwrap();

        let monitor = IntegrityMonitor::new(store.clone(), MonitorConfig::default());
        for _ in 0..8 {
            monitor.snapshot_now().unwrap();
        }
        assert_eq!(store.snapshots().list_snapshots().len(), 5);
    }

    #[tokio::test]
    async fn test_spawn_snapshots_on_start_and_periodically() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write(&record(7.0)).unwrap();
        let before = store.snapshots().list_snapshots().len();

        let config = MonitorConfigBuilder::new()
            .snapshot_interval(20)
            .check_interval(20)
            .build();
        let handle = IntegrityMonitor::new(store.clone(), config).spawn();

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.shutdown().await;

        assert!(store.snapshots().list_snapshots().len() >= before + 2);
    }

    #[tokio::test]
    async fn test_spawn_repairs_in_background() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write(&record(3.0)).unwrap();
        store.snapshots().create_snapshot().unwrap();

        let config = MonitorConfigBuilder::new()
            .snapshot_interval(60_000)
            .check_interval(20)
            .snapshot_on_start(false)
            .build();
        let handle = IntegrityMonitor::new(store.clone(), config).spawn();

        fs::write(store.path(), "garbage").unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.shutdown().await;

        assert_eq!(store.inspect().unwrap(), Some(record(3.0)));
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let handle = IntegrityMonitor::new(store, MonitorConfig::default()).spawn();
        handle.shutdown().await;
    }
}
