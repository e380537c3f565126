//! The critical file set and per-kind corruption checks.

use psg_core::{CorruptionError, PanelRecord};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;

/// How the contents of a critical file are checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    /// JSON that must pass the panel record validator.
    PanelState,
    /// An HTML page that must carry a doctype and a closing tag.
    Html,
    /// Only presence is checked.
    #[default]
    Opaque,
}

impl FileKind {
    /// Check file contents for corruption.
    pub fn inspect(&self, contents: &[u8]) -> Result<(), CorruptionError> {
        match self {
            FileKind::PanelState => PanelRecord::from_json(contents).map(|_| ()),
            FileKind::Html => {
                let text = String::from_utf8_lossy(contents).to_ascii_lowercase();
                if !text.contains("<!doctype html>") {
                    return Err(CorruptionError::MissingMarker("<!DOCTYPE html>"));
                }
                if !text.contains("</html>") {
                    return Err(CorruptionError::MissingMarker("</html>"));
                }
                Ok(())
            }
            FileKind::Opaque => Ok(()),
        }
    }
}

/// A file covered by snapshots and integrity scans.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalFile {
    pub name: String,
    #[serde(default)]
    pub kind: FileKind,
}

impl CriticalFile {
    pub fn new(name: impl Into<String>, kind: FileKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn panel_state(name: impl Into<String>) -> Self {
        Self::new(name, FileKind::PanelState)
    }

    pub fn html(name: impl Into<String>) -> Self {
        Self::new(name, FileKind::Html)
    }

    /// The state file plus the two pages served alongside it.
    pub fn defaults() -> Vec<CriticalFile> {
        vec![
            CriticalFile::panel_state("panel.json"),
            CriticalFile::html("index.html"),
            CriticalFile::html("carteira.html"),
        ]
    }

    /// Read and check the live copy of this file inside `dir`.
    pub fn inspect_in(&self, dir: &Path) -> FileStatus {
        match std::fs::read(dir.join(&self.name)) {
            Ok(contents) => match self.kind.inspect(&contents) {
                Ok(()) => FileStatus::Healthy,
                Err(e) => FileStatus::Corrupted(e),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => FileStatus::Missing,
            Err(e) => FileStatus::Corrupted(CorruptionError::Unreadable(e)),
        }
    }
}

/// Result of inspecting one live critical file.
#[derive(Debug)]
pub enum FileStatus {
    Healthy,
    Missing,
    Corrupted(CorruptionError),
}

impl FileStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, FileStatus::Healthy)
    }

    pub fn is_corrupted(&self) -> bool {
        matches!(self, FileStatus::Corrupted(_))
    }
}

/// True for a bare file name with no directory components.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}
