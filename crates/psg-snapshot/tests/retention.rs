//! Retention tests for snapshot pruning.
//!
//! These tests verify:
//! - Pruning keeps exactly min(n, total) snapshots
//! - The survivors are always the newest by creation order
//! - Pruned snapshots disappear as whole directories

use psg_snapshot::{CriticalFile, SnapshotConfig, SnapshotId, SnapshotStore};
use std::fs;
use tempfile::TempDir;

fn store_with_snapshots(dir: &TempDir, count: usize) -> (SnapshotStore, Vec<SnapshotId>) {
    let config = SnapshotConfig {
        data_dir: dir.path().to_path_buf(),
        critical_files: vec![CriticalFile::panel_state("panel.json")],
        ..Default::default()
    };
    let store = SnapshotStore::new(config).unwrap();

    let mut ids = Vec::new();
    for i in 0..count {
        let record = serde_json::json!({
            "availableBalance": i,
            "receivableBalance": 0,
            "feeDue": 0,
            "isActive": true
        });
        fs::write(dir.path().join("panel.json"), record.to_string()).unwrap();
        ids.push(store.create_snapshot().unwrap().id);
    }

    (store, ids)
}

#[test]
fn test_twelve_snapshots_pruned_to_ten() {
    let dir = TempDir::new().unwrap();
    let (store, ids) = store_with_snapshots(&dir, 12);

    let removed = store.prune_snapshots(10);
    assert_eq!(removed, 2);

    let remaining: Vec<_> = store.list_snapshots().into_iter().map(|s| s.id).collect();
    let expected: Vec<_> = ids.iter().rev().take(10).copied().collect();
    assert_eq!(remaining, expected);
}

#[test]
fn test_prune_keeps_min_of_limit_and_total() {
    for (total, limit) in [(0, 3), (2, 5), (5, 5), (7, 3), (4, 0)] {
        let dir = TempDir::new().unwrap();
        let (store, ids) = store_with_snapshots(&dir, total);

        store.prune_snapshots(limit);

        let remaining: Vec<_> = store.list_snapshots().into_iter().map(|s| s.id).collect();
        assert_eq!(remaining.len(), total.min(limit), "total={total} limit={limit}");

        let newest: Vec<_> = ids.iter().rev().take(limit).copied().collect();
        assert_eq!(remaining, newest, "total={total} limit={limit}");
    }
}

#[test]
fn test_pruned_directories_are_gone() {
    let dir = TempDir::new().unwrap();
    let (store, ids) = store_with_snapshots(&dir, 4);

    store.prune_snapshots(1);

    let backup_root = dir.path().join("_backups");
    let names: Vec<_> = fs::read_dir(&backup_root)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();

    assert_eq!(names, vec![ids[3].dir_name()]);
}

#[test]
fn test_restore_takes_newest_copy() {
    let dir = TempDir::new().unwrap();
    let (store, _) = store_with_snapshots(&dir, 3);

    fs::write(dir.path().join("panel.json"), "]]").unwrap();
    assert!(store.restore_latest_file("panel.json"));

    let restored: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.path().join("panel.json")).unwrap()).unwrap();
    assert_eq!(restored["availableBalance"], 2);
}
