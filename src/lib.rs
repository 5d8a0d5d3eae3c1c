#![forbid(unsafe_code)]

//! treewatch — real-time recursive directory change observer for Linux.
//!
//! Watches a root directory and every descendant directory through inotify
//! and emits one semantic event per file or directory change. The hard part
//! is the watch manager:
//! 1. **Watch cache** — a watch-descriptor → path mapping kept consistent
//!    while outside processes mutate the tree underneath us
//! 2. **Cookie pairing** — a rename is reported as one event, not two
//! 3. **Bulk cache surgery** — prefix rewriting on subtree renames, subtree
//!    zapping on out-of-tree moves
//! 4. **Recovery** — full reinitialization on kernel queue overflow or any
//!    detected cache inconsistency

pub mod core;
pub mod emit;
pub mod prelude;
pub mod watch;
