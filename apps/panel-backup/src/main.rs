//! # Panel Backup
//!
//! Operator tool for the snapshot directory of a Panel State Guard
//! installation. Works on the files directly and does not need the server
//! to be running.
//!
//! ```text
//! panel-backup backup     take a snapshot now, then prune to the retention limit
//! panel-backup restore    restore every critical file from the newest snapshot
//! panel-backup list       list snapshots, newest first
//! panel-backup check      run the integrity checks, exit non-zero on failure
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{CommandFactory, Parser, Subcommand};
use colored::*;
use psg_snapshot::SnapshotStore;
use psg_store::{check_system, load_storage_config, StoreConfig};
use tracing_subscriber::EnvFilter;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "panel-backup")]
#[command(about = "Snapshot maintenance for Panel State Guard")]
#[command(version)]
struct Cli {
    /// Server config file; only the [storage] table is read
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory, overrides [storage].data_dir
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Take a snapshot now and prune old ones
    Backup,
    /// Restore every critical file from the newest snapshot
    Restore,
    /// List snapshots with their timestamps and file counts
    List,
    /// Check the backup directory, critical files and snapshots
    Check,
}

/// The server's `[storage]` table, found the same way the server finds it.
fn load_storage(path: Option<&Path>, data_dir: Option<PathBuf>, search_dir: &Path) -> Result<StoreConfig> {
    let mut storage =
        load_storage_config(path, search_dir).context("failed to load storage config")?;
    if let Some(dir) = data_dir {
        storage.data_dir = dir;
    }
    Ok(storage)
}

// ─── Commands ──────────────────────────────────────────────────────────────

fn run(command: Commands, store: &SnapshotStore, out: &mut impl Write) -> Result<bool> {
    match command {
        Commands::Backup => run_backup(store, out),
        Commands::Restore => run_restore(store, out),
        Commands::List => run_list(store, out),
        Commands::Check => run_check(store, out),
    }
}

fn run_backup(store: &SnapshotStore, out: &mut impl Write) -> Result<bool> {
    let snapshot = store.rotate()?;
    writeln!(
        out,
        "{} Snapshot {} created ({} files)",
        "✓".bright_green().bold(),
        snapshot.id.to_string().bold(),
        snapshot.file_count()
    )?;
    Ok(true)
}

fn run_restore(store: &SnapshotStore, out: &mut impl Write) -> Result<bool> {
    let restored = store.restore_all();
    if restored == 0 {
        writeln!(out, "{} No files restored", "✗".bright_red().bold())?;
        return Ok(false);
    }
    writeln!(
        out,
        "{} Restored {} file(s) into {}",
        "✓".bright_green().bold(),
        restored.to_string().bold(),
        store.data_dir().display()
    )?;
    Ok(true)
}

fn run_list(store: &SnapshotStore, out: &mut impl Write) -> Result<bool> {
    let snapshots = store.list_snapshots();
    if snapshots.is_empty() {
        writeln!(out, "  {}", "(no snapshots)".dimmed())?;
        return Ok(true);
    }

    writeln!(
        out,
        "{} {} snapshot(s) in {}",
        "▸".bright_yellow(),
        snapshots.len(),
        store.backup_dir().display()
    )?;
    for (index, snapshot) in snapshots.iter().enumerate() {
        writeln!(
            out,
            "{}. {} ({}) - {} files",
            index + 1,
            snapshot.id,
            snapshot
                .id
                .created_at()
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S"),
            snapshot.file_count()
        )?;
    }
    Ok(true)
}

fn run_check(store: &SnapshotStore, out: &mut impl Write) -> Result<bool> {
    let report = check_system(store);

    for check in &report.checks {
        let mark = if check.passed {
            "✓".bright_green().bold()
        } else {
            "✗".bright_red().bold()
        };
        writeln!(out, "{} {}: {}", mark, check.name.bold(), check.detail)?;
    }

    if report.passed() {
        writeln!(out, "{}", "System integrity verified".bright_green())?;
    } else {
        writeln!(out, "{}", "Integrity failures detected".bright_red().bold())?;
    }
    Ok(report.passed())
}

// ─── Main ──────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::from(2);
    };

    let result = load_storage(cli.config.as_deref(), cli.data_dir, Path::new("."))
        .and_then(|storage| Ok(SnapshotStore::new(storage.snapshot_config())?))
        .and_then(|store| run(command, &store, &mut io::stdout().lock()));

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "error:".bright_red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const RECORD: &str = r#"{"availableBalance":5,"receivableBalance":0,"feeDue":0,"isActive":true}"#;
    const PAGE: &str = "<!DOCTYPE html><html></html>";

    fn setup() -> (TempDir, SnapshotStore) {
        colored::control::set_override(false);
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("panel.json"), RECORD).unwrap();
        fs::write(dir.path().join("index.html"), PAGE).unwrap();
        fs::write(dir.path().join("carteira.html"), PAGE).unwrap();

        let storage = load_storage(None, Some(dir.path().to_path_buf()), dir.path()).unwrap();
        let store = SnapshotStore::new(storage.snapshot_config()).unwrap();
        (dir, store)
    }

    fn exec(command: Commands, store: &SnapshotStore) -> (bool, String) {
        let mut out = Vec::new();
        let ok = run(command, store, &mut out).unwrap();
        (ok, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["panel-backup", "--data-dir", "/srv/panel", "list"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::List)));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/srv/panel")));

        assert!(Cli::try_parse_from(["panel-backup", "frobnicate"]).is_err());
        assert!(Cli::try_parse_from(["panel-backup"]).unwrap().command.is_none());
    }

    #[test]
    fn test_backup_then_list() {
        let (_dir, store) = setup();

        let (ok, output) = exec(Commands::Backup, &store);
        assert!(ok);
        assert!(output.contains("(3 files)"));

        exec(Commands::Backup, &store);
        let (ok, output) = exec(Commands::List, &store);
        assert!(ok);
        assert!(output.contains("2 snapshot(s)"));
        assert!(output.contains("1. backup-"));
        assert!(output.contains("2. backup-"));
        assert!(output.contains(" - 3 files"));
    }

    #[test]
    fn test_list_empty() {
        let (_dir, store) = setup();
        let (ok, output) = exec(Commands::List, &store);
        assert!(ok);
        assert!(output.contains("(no snapshots)"));
    }

    #[test]
    fn test_restore() {
        let (dir, store) = setup();

        let (ok, _) = exec(Commands::Restore, &store);
        assert!(!ok);

        exec(Commands::Backup, &store);
        fs::write(dir.path().join("panel.json"), "{").unwrap();
        fs::remove_file(dir.path().join("index.html")).unwrap();

        let (ok, output) = exec(Commands::Restore, &store);
        assert!(ok);
        assert!(output.contains("Restored 3 file(s)"));
        assert_eq!(fs::read_to_string(dir.path().join("panel.json")).unwrap(), RECORD);
        assert_eq!(fs::read_to_string(dir.path().join("index.html")).unwrap(), PAGE);
    }

    #[test]
    fn test_check() {
        let (dir, store) = setup();

        let (ok, output) = exec(Commands::Check, &store);
        assert!(!ok);
        assert!(output.contains("✗ snapshots"));

        exec(Commands::Backup, &store);
        let (ok, output) = exec(Commands::Check, &store);
        assert!(ok, "{output}");
        assert!(output.contains("System integrity verified"));

        fs::write(dir.path().join("carteira.html"), "<html>").unwrap();
        let (ok, output) = exec(Commands::Check, &store);
        assert!(!ok);
        assert!(output.contains("carteira.html"));
    }

    #[test]
    fn test_load_storage_reads_only_storage_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panel-guard.toml");
        fs::write(
            &path,
            "[storage]\nmax_snapshots = 4\n\n[sync]\nbind_addr = \"127.0.0.1:1\"\n",
        )
        .unwrap();

        let storage = load_storage(Some(&path), None, dir.path()).unwrap();
        assert_eq!(storage.max_snapshots, 4);
        assert!(load_storage(Some(&dir.path().join("nope.toml")), None, dir.path()).is_err());
    }

    #[test]
    fn test_load_storage_finds_default_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("panel-guard.toml"),
            "[storage]\ndata_dir = \"/srv/panel\"\nmax_snapshots = 3\n",
        )
        .unwrap();

        let storage = load_storage(None, None, dir.path()).unwrap();
        assert_eq!(storage.data_dir, PathBuf::from("/srv/panel"));
        assert_eq!(storage.max_snapshots, 3);

        let storage = load_storage(None, Some(PathBuf::from("/tmp/panel")), dir.path()).unwrap();
        assert_eq!(storage.data_dir, PathBuf::from("/tmp/panel"));
        assert_eq!(storage.max_snapshots, 3);
    }
}
