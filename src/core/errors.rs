//! TW-prefixed error types with structured error codes.

use std::path::PathBuf;

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, TwError>;

/// Top-level error type for treewatch.
///
/// Only initialization failures and kernel-read failures surface to the
/// caller; the event loop absorbs and logs everything else.
#[derive(Debug, Error)]
pub enum TwError {
    #[error("[TW-1001] not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("[TW-1002] failed to set up {component}: {source}")]
    Init {
        component: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("[TW-1003] failed to watch root {path}: {source}")]
    RootWatch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TW-1101] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[TW-1102] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[TW-2001] failed to read kernel events: {source}")]
    EventRead {
        #[source]
        source: std::io::Error,
    },

    #[error("[TW-2002] reinitialization failed: {details}")]
    Reinit { details: String },

    #[error("[TW-3001] runtime failure: {details}")]
    Runtime { details: String },
}

impl TwError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotADirectory { .. } => "TW-1001",
            Self::Init { .. } => "TW-1002",
            Self::RootWatch { .. } => "TW-1003",
            Self::ConfigParse { .. } => "TW-1101",
            Self::MissingConfig { .. } => "TW-1102",
            Self::EventRead { .. } => "TW-2001",
            Self::Reinit { .. } => "TW-2002",
            Self::Runtime { .. } => "TW-3001",
        }
    }

    /// Whether the failure happened before the event loop could start.
    #[must_use]
    pub const fn is_initialization(&self) -> bool {
        matches!(
            self,
            Self::NotADirectory { .. }
                | Self::Init { .. }
                | Self::RootWatch { .. }
                | Self::ConfigParse { .. }
                | Self::MissingConfig { .. }
        )
    }
}

impl From<toml::de::Error> for TwError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
