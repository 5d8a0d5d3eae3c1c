//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use treewatch::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, TwError};

// Emission
pub use crate::emit::console::{PrinterConfig, PrinterHandle, spawn_printer};
pub use crate::emit::event::{ChangeEvent, ChangeKind};
pub use crate::emit::sink::EventSink;

// Watch manager
pub use crate::watch::cache::WatchCache;
pub use crate::watch::ignore::IgnoreList;
pub use crate::watch::watcher::{TreeWatcher, WatcherHandle, WatcherOptions};
