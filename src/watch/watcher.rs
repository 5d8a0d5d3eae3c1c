//! Lifecycle controller and event interpreter for the watch manager.
//!
//! Single-threaded core: the watcher thread is the sole mutator of the
//! cache, queue and buffer, so none of them are locked. The only
//! cross-thread contact points are the atomic stop flag and the eventfd
//! wakeup, both reachable through `WatcherHandle`.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use inotify::{EventMask, Inotify, WatchDescriptor, WatchMask};
use nix::sys::eventfd::EventFd;

use crate::core::errors::{Result, TwError};
use crate::emit::event::{ChangeEvent, ChangeKind};
use crate::emit::sink::EventSink;
use crate::watch::cache::WatchCache;
use crate::watch::event::RawEvent;
use crate::watch::ignore::IgnoreList;
use crate::watch::poller::{self, ReadinessPoller, Wake};

// ──────────────────── buffer sizing ────────────────────

/// Fixed header size of one packed kernel record.
const RECORD_HEADER_BYTES: usize = 16;
/// Name allowance per record when sizing the drain buffer.
const RECORD_NAME_BYTES: usize = 16;

// ──────────────────── options ────────────────────

/// Options for building a watcher.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Absolute root directory to watch.
    pub root: PathBuf,
    /// Directory basenames that are never watched.
    pub ignore: IgnoreList,
    /// How many maximum-size kernel records one buffer drain can hold.
    pub max_buffered_events: usize,
}

impl WatcherOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: IgnoreList::default(),
            max_buffered_events: 4096,
        }
    }
}

// ──────────────────── stop handle ────────────────────

/// Cross-thread stop handle for a running watcher.
#[derive(Clone, Debug)]
pub struct WatcherHandle {
    stopped: Arc<AtomicBool>,
    wakeup: Arc<EventFd>,
}

impl WatcherHandle {
    /// Request stop. Idempotent: the first call sets the flag and arms the
    /// wakeup so an in-progress readiness wait returns; later calls are
    /// no-ops.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            let _ = self.wakeup.arm();
        }
    }

    /// Whether stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

// ──────────────────── watcher ────────────────────

type Cache = WatchCache<WatchDescriptor>;

/// The watch manager: owns the kernel notification channel, the readiness
/// multiplexer, the watch cache and the raw-event queue, and turns raw
/// kernel records into semantic events on the injected sink.
///
/// All three descriptors are released exactly once when the watcher drops,
/// on every exit path.
pub struct TreeWatcher {
    root: PathBuf,
    ignore: IgnoreList,
    inotify: Inotify,
    poller: ReadinessPoller,
    wakeup: Arc<EventFd>,
    stopped: Arc<AtomicBool>,
    cache: Cache,
    queue: VecDeque<RawEvent>,
    buffer: Vec<u8>,
    sink: Box<dyn EventSink>,
}

impl std::fmt::Debug for TreeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWatcher")
            .field("root", &self.root)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl TreeWatcher {
    /// Build the kernel notification channel, the stop wakeup and the
    /// readiness multiplexer, then install watches on `root` and every
    /// unignored descendant directory. Any failure here is fatal and
    /// carries the underlying OS reason.
    pub fn new(options: WatcherOptions, sink: Box<dyn EventSink>) -> Result<(Self, WatcherHandle)> {
        if !options.root.is_dir() {
            return Err(TwError::NotADirectory { path: options.root });
        }

        let wakeup = poller::new_wakeup()?;
        let inotify = Inotify::init().map_err(|e| TwError::Init {
            component: "kernel notification channel",
            source: e,
        })?;
        let mplex = ReadinessPoller::new(&inotify, wakeup.as_ref())?;

        let stopped = Arc::new(AtomicBool::new(false));
        let handle = WatcherHandle {
            stopped: Arc::clone(&stopped),
            wakeup: Arc::clone(&wakeup),
        };

        let buffer_len = options.max_buffered_events * (RECORD_HEADER_BYTES + RECORD_NAME_BYTES);
        let mut watcher = Self {
            root: options.root,
            ignore: options.ignore,
            inotify,
            poller: mplex,
            wakeup,
            stopped,
            cache: Cache::new(),
            queue: VecDeque::new(),
            buffer: vec![0u8; buffer_len],
            sink,
        };

        let root = watcher.root.clone();
        watcher.install_watches_at(&root)?;

        Ok((watcher, handle))
    }

    /// Root directory this watcher observes.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths currently cached as watched (diagnostics and tests).
    #[must_use]
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.cache.iter().map(|(_, p)| p.clone()).collect()
    }

    /// Run the event loop until stop is requested or the root becomes
    /// unwatchable.
    pub fn run(&mut self) -> Result<()> {
        while !self.stop_requested() {
            self.step()?;
        }
        Ok(())
    }

    /// One interpreter step: drain the kernel source until at least one raw
    /// event is queued (or stop is requested), then process the queue front
    /// to back.
    pub fn step(&mut self) -> Result<()> {
        while self.queue.is_empty() && !self.stop_requested() {
            self.pump()?;
        }

        while !self.stop_requested() {
            let Some(event) = self.queue.pop_front() else {
                break;
            };
            self.dispatch(&event)?;
        }
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn emit(&self, event: ChangeEvent) {
        self.sink.emit(event);
    }

    // ──────────────────── draining ────────────────────

    /// Wait for readiness and drain one batch of kernel records into the
    /// raw-event queue, preserving kernel order.
    ///
    /// Records flagged `IGNORED` are dropped here: watch removal is modeled
    /// explicitly in the cache, and replaying the kernel's own removals
    /// would mutate it twice.
    fn pump(&mut self) -> Result<()> {
        if self.poller.wait()? == Wake::Stop {
            return Ok(());
        }

        let events = match self.inotify.read_events(&mut self.buffer) {
            Ok(events) => events,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) => return Err(TwError::EventRead { source: e }),
        };

        for event in events {
            if event.mask.contains(EventMask::IGNORED) {
                continue;
            }
            self.queue.push_back(RawEvent::from(event));
        }
        Ok(())
    }

    // ──────────────────── interpretation ────────────────────

    /// Interpret one raw event.
    fn dispatch(&mut self, event: &RawEvent) -> Result<()> {
        // The root itself was deleted or moved away.
        if event
            .mask
            .intersects(EventMask::DELETE_SELF | EventMask::MOVE_SELF)
        {
            self.emit(ChangeEvent::new(
                ChangeKind::NothingToWatch,
                self.root.clone(),
            ));
            self.stopped.store(true, Ordering::SeqCst);
            return Ok(());
        }

        if event.mask.contains(EventMask::Q_OVERFLOW) {
            eprintln!("[TWATCH-WATCH] kernel queue overflow; events were lost");
            return self.reinitialize();
        }

        let Some(dir) = self.cache.lookup(&event.wd).map(Path::to_path_buf) else {
            eprintln!("[TWATCH-WATCH] event for unknown watch descriptor; cache is inconsistent");
            return self.reinitialize();
        };
        let full_path = dir.join(&event.name);

        if event.is_dir() {
            self.on_directory_event(event, &dir, &full_path)
        } else {
            self.on_file_event(event, &dir, &full_path)
        }
    }

    fn on_directory_event(&mut self, event: &RawEvent, dir: &Path, full_path: &Path) -> Result<()> {
        if event.mask.contains(EventMask::DELETE) {
            if let Some(wd) = self.cache.find_by_path(full_path) {
                // The kernel already dropped this watch and its IGNORED
                // record was discarded at parse time; erasing the cache
                // entry is the whole cleanup.
                self.cache.erase(&wd);
                self.emit(ChangeEvent::new(ChangeKind::DeletedDirectory, full_path));
            }
            return Ok(());
        }

        if event
            .mask
            .intersects(EventMask::CREATE | EventMask::MOVED_TO)
        {
            // An ignored subtree stays silent as well as unwatched.
            if self.ignore.matches_basename(full_path) {
                return Ok(());
            }
            self.emit(ChangeEvent::new(ChangeKind::CreatedDirectory, full_path));
            // Entries created inside the new subtree before these watches
            // land are missed; accepted limitation.
            if let Err(e) = self.install_watches_at(full_path) {
                eprintln!(
                    "[TWATCH-WATCH] failed to watch new subtree {}: {e}",
                    full_path.display()
                );
            }
            return Ok(());
        }

        if event.mask.contains(EventMask::MOVED_FROM) {
            return self.on_directory_moved_from(event, dir, full_path);
        }

        Ok(())
    }

    /// Pair a directory move-from with the queue head, or treat it as a
    /// move out of the watched tree.
    fn on_directory_moved_from(
        &mut self,
        event: &RawEvent,
        dir: &Path,
        full_path: &Path,
    ) -> Result<()> {
        let Some(next) = self.match_moved_to(event.cookie) else {
            self.emit(ChangeEvent::new(ChangeKind::MovedDirectoryOut, full_path));
            return self.zap_subtree(full_path);
        };

        let Some(next_dir) = self.cache.lookup(&next.wd).map(Path::to_path_buf) else {
            eprintln!(
                "[TWATCH-WATCH] move target for unknown watch descriptor; cache is inconsistent"
            );
            return self.reinitialize();
        };
        let new_path = next_dir.join(&next.name);

        let kind = if next_dir == dir {
            ChangeKind::RenamedDirectory
        } else {
            ChangeKind::MovedDirectory
        };
        self.emit(ChangeEvent::moved(kind, full_path, &new_path));

        // The kernel watches follow the inodes across the rename; only the
        // cached paths go stale.
        self.cache.rewrite_prefix(full_path, &new_path);
        Ok(())
    }

    fn on_file_event(&mut self, event: &RawEvent, dir: &Path, full_path: &Path) -> Result<()> {
        if event
            .mask
            .intersects(EventMask::CREATE | EventMask::MOVED_TO)
        {
            self.emit(ChangeEvent::new(ChangeKind::CreatedFile, full_path));
        } else if event.mask.contains(EventMask::DELETE) {
            self.emit(ChangeEvent::new(ChangeKind::DeletedFile, full_path));
        } else if event.mask.contains(EventMask::MODIFY) {
            self.emit(ChangeEvent::new(ChangeKind::ModifiedFile, full_path));
        } else if event.mask.contains(EventMask::MOVED_FROM) {
            match self.match_moved_to(event.cookie) {
                None => {
                    self.emit(ChangeEvent::new(ChangeKind::MovedFileOut, full_path));
                }
                Some(next) => {
                    let Some(next_dir) = self.cache.lookup(&next.wd).map(Path::to_path_buf) else {
                        eprintln!(
                            "[TWATCH-WATCH] move target for unknown watch descriptor; cache is inconsistent"
                        );
                        return self.reinitialize();
                    };
                    let new_path = next_dir.join(&next.name);
                    let kind = if next_dir == dir {
                        ChangeKind::RenamedFile
                    } else {
                        ChangeKind::MovedFile
                    };
                    self.emit(ChangeEvent::moved(kind, full_path, &new_path));
                }
            }
        }
        Ok(())
    }

    /// Pop the queue head only if it is the matching second half of the
    /// rename. Pairing peeks one event ahead and no further: the kernel
    /// delivers intra-process rename halves adjacently, and a non-matching
    /// head must stay queued.
    fn match_moved_to(&mut self, cookie: u32) -> Option<RawEvent> {
        let head = self.queue.front()?;
        if head.mask.contains(EventMask::MOVED_TO) && head.cookie == cookie {
            self.queue.pop_front()
        } else {
            None
        }
    }

    // ──────────────────── watch installation ────────────────────

    /// Install watches on `dir` and, via an explicit worklist, on every
    /// unignored descendant directory.
    ///
    /// A recursing iterator would descend into ignored directories before
    /// the filter applies, so the worklist goes one level at a time.
    /// Registration failure on `dir` itself propagates; failures on
    /// descendants are logged and their subtrees skipped.
    fn install_watches_at(&mut self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(TwError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }
        if self.ignore.matches_basename(dir) {
            return Ok(());
        }

        let mut worklist: Vec<PathBuf> = vec![dir.to_path_buf()];
        let mut at_subtree_root = true;
        while let Some(current) = worklist.pop() {
            let fatal = at_subtree_root;
            at_subtree_root = false;

            if let Err(e) = self.add_watch(&current) {
                if fatal {
                    return Err(TwError::RootWatch {
                        path: current,
                        source: e,
                    });
                }
                eprintln!(
                    "[TWATCH-WATCH] failed to watch {}: {e}",
                    current.display()
                );
                continue;
            }

            let entries = match fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(e) => {
                    eprintln!(
                        "[TWATCH-WATCH] failed to list {}: {e}",
                        current.display()
                    );
                    continue;
                }
            };
            for entry in entries.flatten() {
                // Symlinked directories report a symlink file type here, so
                // they are skipped without being followed.
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if !is_dir {
                    continue;
                }
                let path = entry.path();
                if self.ignore.matches_basename(&path) {
                    continue;
                }
                worklist.push(path);
            }
        }
        Ok(())
    }

    /// Register one directory with the kernel and record it in the cache.
    ///
    /// The root registration (first entry into an empty cache) additionally
    /// watches for the directory itself being deleted or moved; emitting
    /// those on every descendant would duplicate the shutdown signal.
    fn add_watch(&mut self, path: &Path) -> std::io::Result<()> {
        let mut mask = WatchMask::CREATE
            | WatchMask::DELETE
            | WatchMask::MOVE
            | WatchMask::MODIFY
            | WatchMask::DONT_FOLLOW;
        if self.cache.is_empty() {
            mask |= WatchMask::DELETE_SELF | WatchMask::MOVE_SELF;
        }

        let wd = self.inotify.watches().add(path, mask)?;
        self.cache.insert(wd, path.to_path_buf());
        Ok(())
    }

    // ──────────────────── recovery ────────────────────

    /// Evict the subtree rooted at `prefix` from the cache and drop the
    /// corresponding kernel watches. A kernel failure here means the cache
    /// and the kernel's watch set have diverged.
    fn zap_subtree(&mut self, prefix: &Path) -> Result<()> {
        let evicted = self.cache.remove_subtree(prefix);
        let mut watches = self.inotify.watches();
        for (wd, path) in evicted {
            if let Err(e) = watches.remove(wd) {
                eprintln!(
                    "[TWATCH-WATCH] failed to drop watch on {}: {e}; cache is inconsistent",
                    path.display()
                );
                return self.reinitialize();
            }
        }
        Ok(())
    }

    /// Full recovery: drop every cached watch (best-effort; the kernel may
    /// already have forgotten them), rebuild the notification channel and
    /// the multiplexer, re-watch the root recursively, and clear the queue.
    /// The stop wakeup is owned by the handle side and survives, so
    /// `stop()` keeps working mid-recovery.
    fn reinitialize(&mut self) -> Result<()> {
        eprintln!(
            "[TWATCH-WATCH] reinitializing watches under {}",
            self.root.display()
        );

        let mut watches = self.inotify.watches();
        for (wd, _) in self.cache.drain() {
            let _ = watches.remove(wd);
        }
        drop(watches);

        let inotify = Inotify::init().map_err(|e| TwError::Reinit {
            details: format!("kernel notification channel: {e}"),
        })?;
        let mplex = ReadinessPoller::new(&inotify, self.wakeup.as_ref())
            .map_err(|e| TwError::Reinit {
                details: e.to_string(),
            })?;
        // Assigning closes the previous descriptors.
        self.inotify = inotify;
        self.poller = mplex;

        self.queue.clear();

        if !self.root.is_dir() {
            return Err(TwError::Reinit {
                details: format!("root {} is no longer a directory", self.root.display()),
            });
        }
        let root = self.root.clone();
        self.install_watches_at(&root).map_err(|e| TwError::Reinit {
            details: e.to_string(),
        })?;

        eprintln!(
            "[TWATCH-WATCH] reinitialized with {} watched directories",
            self.cache.len()
        );
        Ok(())
    }
}
