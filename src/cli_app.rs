//! Command-line front-end: argument parsing, signal handling, and the
//! controller thread that hosts the watcher.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use colored::control;
use signal_hook::consts::{SIGINT, SIGTERM};

use treewatch::core::config::Config;
use treewatch::core::errors::{Result, TwError};
use treewatch::core::paths::canonical_watch_root;
use treewatch::emit::console::{PrinterConfig, spawn_printer};
use treewatch::watch::ignore::IgnoreList;
use treewatch::watch::watcher::{TreeWatcher, WatcherOptions};

/// Interval at which the controller thread polls the shutdown flag.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(150);

/// treewatch — follow changes under a directory tree in real time.
#[derive(Debug, Parser)]
#[command(
    name = "twatch",
    author,
    version,
    about = "Watch a directory tree and print every change",
    long_about = None
)]
pub struct Cli {
    /// Root directory to watch.
    #[arg(value_name = "ROOT")]
    root: PathBuf,
    /// Directory basenames to leave unwatched (for example `.git`).
    #[arg(value_name = "IGNORE")]
    ignored: Vec<String>,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// One JSON object per event line instead of the human format.
    #[arg(long)]
    json: bool,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Suppress startup and shutdown notices.
    #[arg(short, long)]
    quiet: bool,
}

// ──────────────────── signal handling ────────────────────

/// Shutdown flag shared between the OS signal hooks and the controller loop.
///
/// SIGINT and SIGTERM both request shutdown. Registration is best-effort;
/// failures are logged to stderr but the watcher still runs.
#[derive(Clone)]
struct SignalHandler {
    shutdown: Arc<AtomicBool>,
}

impl SignalHandler {
    fn new() -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        for signal in [SIGINT, SIGTERM] {
            if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&shutdown)) {
                eprintln!("[TWATCH-SIGNAL] failed to register signal {signal}: {e}");
            }
        }
        Self { shutdown }
    }

    fn should_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

// ──────────────────── entry point ────────────────────

pub fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    if cli.no_color || !config.output.color || !std::io::stdout().is_terminal() {
        control::set_override(false);
    }

    let root = canonical_watch_root(&cli.root)?;

    let mut ignore_names = config.watch.ignore.clone();
    ignore_names.extend(cli.ignored.iter().cloned());
    let ignore = IgnoreList::new(ignore_names);

    let (printer, printer_join) = spawn_printer(PrinterConfig {
        json: cli.json,
        channel_capacity: config.output.channel_capacity,
    })?;

    let options = WatcherOptions {
        root: root.clone(),
        ignore,
        max_buffered_events: config.watch.max_buffered_events,
    };
    let (mut watcher, handle) = TreeWatcher::new(options, Box::new(printer.clone()))?;

    if !cli.quiet {
        eprintln!(
            "[TWATCH] watching {} (press Ctrl+C to stop)",
            root.display()
        );
    }

    let signals = SignalHandler::new();

    // Thread A (this one) keeps the process alive and owns the stop signal;
    // thread B owns the event loop and all watch state.
    let worker = thread::Builder::new()
        .name("twatch-watch".to_string())
        .spawn(move || watcher.run())
        .map_err(|e| TwError::Runtime {
            details: format!("failed to spawn watcher thread: {e}"),
        })?;

    while !signals.should_shutdown() && !worker.is_finished() {
        thread::sleep(SHUTDOWN_POLL_INTERVAL);
    }

    handle.stop();
    let outcome = worker.join();

    printer.shutdown();
    let _ = printer_join.join();

    match outcome {
        Ok(result) => result,
        Err(_) => Err(TwError::Runtime {
            details: "watcher thread panicked".to_string(),
        }),
    }
}
