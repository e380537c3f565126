//! System integrity report for operators.

use psg_snapshot::{FileStatus, SnapshotStore};
use serde::Serialize;
use std::fmt;

/// One named check and its result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IntegrityCheck {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl IntegrityCheck {
    fn new(name: &'static str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for IntegrityCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "ok" } else { "FAIL" };
        write!(f, "[{mark}] {}: {}", self.name, self.detail)
    }
}

/// Every check run by [`check_system`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub checks: Vec<IntegrityCheck>,
}

impl IntegrityReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &IntegrityCheck> {
        self.checks.iter().filter(|check| !check.passed)
    }
}

/// Check the backup directory, the presence and contents of every critical
/// file, and that at least one snapshot exists. Read only.
pub fn check_system(snapshots: &SnapshotStore) -> IntegrityReport {
    let mut checks = Vec::with_capacity(4);

    let backup_dir = snapshots.backup_dir();
    checks.push(IntegrityCheck::new(
        "backup-dir",
        backup_dir.is_dir(),
        backup_dir.display().to_string(),
    ));

    let statuses = snapshots.inspect_all();

    let missing: Vec<&str> = statuses
        .iter()
        .filter(|(_, status)| matches!(status, FileStatus::Missing))
        .map(|(file, _)| file.name.as_str())
        .collect();
    checks.push(if missing.is_empty() {
        IntegrityCheck::new("critical-files", true, format!("{} present", statuses.len()))
    } else {
        IntegrityCheck::new("critical-files", false, format!("missing: {}", missing.join(", ")))
    });

    let corrupted: Vec<String> = statuses
        .iter()
        .filter_map(|(file, status)| match status {
            FileStatus::Corrupted(err) => Some(format!("{} ({err})", file.name)),
            _ => None,
        })
        .collect();
    checks.push(if corrupted.is_empty() {
        IntegrityCheck::new("file-contents", true, "no corruption detected")
    } else {
        IntegrityCheck::new("file-contents", false, format!("corrupted: {}", corrupted.join(", ")))
    });

    let count = snapshots.list_snapshots().len();
    checks.push(IntegrityCheck::new(
        "snapshots",
        count > 0,
        format!("{count} available"),
    ));

    IntegrityReport { checks }
}
