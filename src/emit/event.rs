//! The semantic event vocabulary emitted by the watch manager.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// Kind of a semantic change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    CreatedFile,
    DeletedFile,
    ModifiedFile,
    CreatedDirectory,
    DeletedDirectory,
    RenamedFile,
    RenamedDirectory,
    MovedFile,
    MovedDirectory,
    /// A file left the watched tree with no matching arrival.
    MovedFileOut,
    /// A directory left the watched tree with no matching arrival.
    MovedDirectoryOut,
    /// The root itself was deleted or moved away.
    NothingToWatch,
}

impl ChangeKind {
    /// Human-readable label; this is the stable outbound vocabulary.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CreatedFile => "Created file",
            Self::DeletedFile => "Deleted file",
            Self::ModifiedFile => "Modified file",
            Self::CreatedDirectory => "Created directory",
            Self::DeletedDirectory => "Deleted directory",
            Self::RenamedFile => "Renamed file",
            Self::RenamedDirectory => "Renamed directory",
            Self::MovedFile => "Moved file",
            Self::MovedDirectory => "Moved directory",
            Self::MovedFileOut => "Moved file out of watch directory",
            Self::MovedDirectoryOut => "Moved out of watch directory",
            Self::NothingToWatch => "Nothing to watch",
        }
    }

    /// Whether events of this kind carry a destination path.
    #[must_use]
    pub const fn has_destination(self) -> bool {
        matches!(
            self,
            Self::RenamedFile | Self::RenamedDirectory | Self::MovedFile | Self::MovedDirectory
        )
    }
}

/// One semantic change, ready for the emission sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Affected absolute path (the source side for renames and moves).
    pub path: PathBuf,
    /// Destination path for renames and moves.
    pub destination: Option<PathBuf>,
    /// Local wall-clock time the event was interpreted.
    pub timestamp: DateTime<Local>,
}

impl ChangeEvent {
    /// A single-path event, stamped now.
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            destination: None,
            timestamp: Local::now(),
        }
    }

    /// A rename or move event carrying both endpoints, stamped now.
    pub fn moved(kind: ChangeKind, from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: from.into(),
            destination: Some(to.into()),
            timestamp: Local::now(),
        }
    }

    /// The destination if present, else the affected path.
    #[must_use]
    pub fn effective_path(&self) -> &Path {
        self.destination.as_deref().unwrap_or(&self.path)
    }
}
