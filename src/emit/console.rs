//! Console printer: a dedicated thread that renders semantic events as
//! human-readable or JSON lines.
//!
//! Architecture: the watcher thread sends `ChangeEvent`s over a bounded
//! crossbeam channel with `try_send`, so a slow terminal can never stall
//! the event loop; the printer thread owns stdout.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use colored::{ColoredString, Colorize};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde_json::json;

use crate::core::errors::{Result, TwError};
use crate::emit::event::{ChangeEvent, ChangeKind};
use crate::emit::sink::EventSink;

/// Timestamp layout for human-readable lines.
const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

enum PrinterMessage {
    Event(ChangeEvent),
    /// Sentinel to request graceful shutdown of the printer thread.
    Shutdown,
}

/// Options for the printer thread.
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    /// One JSON object per line instead of the human format.
    pub json: bool,
    /// Bounded channel capacity.
    pub channel_capacity: usize,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            json: false,
            channel_capacity: 1024,
        }
    }
}

/// Cheaply-cloneable handle for sending events to the printer thread.
#[derive(Clone)]
pub struct PrinterHandle {
    tx: Sender<PrinterMessage>,
    dropped: Arc<AtomicU64>,
}

impl PrinterHandle {
    /// Send one event. Non-blocking; a full channel drops the line and
    /// increments the dropped counter.
    pub fn send(&self, event: ChangeEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(PrinterMessage::Event(event)) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected is fine during shutdown.
    }

    /// Lines dropped due to channel back-pressure.
    pub fn dropped_lines(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Request graceful shutdown of the printer thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(PrinterMessage::Shutdown);
    }
}

impl EventSink for PrinterHandle {
    fn emit(&self, event: ChangeEvent) {
        self.send(event);
    }
}

/// Spawn the printer thread and return its handle plus join handle.
pub fn spawn_printer(config: PrinterConfig) -> Result<(PrinterHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<PrinterMessage>(config.channel_capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let handle = PrinterHandle {
        tx,
        dropped: Arc::clone(&dropped),
    };

    let join = thread::Builder::new()
        .name("twatch-printer".to_string())
        .spawn(move || printer_thread_main(&rx, config.json, &dropped))
        .map_err(|e| TwError::Runtime {
            details: format!("failed to spawn printer thread: {e}"),
        })?;

    Ok((handle, join))
}

fn printer_thread_main(rx: &Receiver<PrinterMessage>, json: bool, dropped: &AtomicU64) {
    while let Ok(message) = rx.recv() {
        match message {
            PrinterMessage::Event(event) => {
                if json {
                    println!("{}", json_line(&event));
                } else {
                    println!("{}", human_line(&event));
                }
            }
            PrinterMessage::Shutdown => break,
        }
    }

    let lost = dropped.load(Ordering::Relaxed);
    if lost > 0 {
        eprintln!("[TWATCH-PRINT] {lost} event lines dropped under back-pressure");
    }
}

/// `[02-08-2026 14:33:12] Created file: /w/a.txt`
/// `[02-08-2026 14:33:12] Renamed directory: /w/d -> /w/D`
fn human_line(event: &ChangeEvent) -> String {
    let timestamp = event.timestamp.format(TIMESTAMP_FORMAT);
    let kind = paint_kind(event.kind);
    match &event.destination {
        Some(dest) => format!(
            "[{timestamp}] {kind}: {} -> {}",
            event.path.display(),
            dest.display()
        ),
        None => format!("[{timestamp}] {kind}: {}", event.path.display()),
    }
}

/// One self-contained JSON object per line.
fn json_line(event: &ChangeEvent) -> String {
    json!({
        "timestamp": event.timestamp.to_rfc3339(),
        "kind": event.kind.label(),
        "path": event.path.display().to_string(),
        "destination": event.destination.as_ref().map(|d| d.display().to_string()),
    })
    .to_string()
}

fn paint_kind(kind: ChangeKind) -> ColoredString {
    let label = kind.label();
    match kind {
        ChangeKind::CreatedFile | ChangeKind::CreatedDirectory => label.green(),
        ChangeKind::DeletedFile | ChangeKind::DeletedDirectory => label.red(),
        ChangeKind::ModifiedFile => label.yellow(),
        ChangeKind::RenamedFile
        | ChangeKind::RenamedDirectory
        | ChangeKind::MovedFile
        | ChangeKind::MovedDirectory => label.cyan(),
        ChangeKind::MovedFileOut | ChangeKind::MovedDirectoryOut => label.magenta(),
        ChangeKind::NothingToWatch => label.bold(),
    }
}
