//! Shared test infrastructure for treewatch.
//!
//! Provides:
//! - `CmdResult` + `run_cli_case()` — integration test CLI runner
//! - `CollectingSink` — records emitted events for assertions
//! - `step_until()` — drive a watcher until an expected event shows up

// Not every test binary uses every item; suppress dead-code warnings for
// the shared module.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use treewatch::emit::event::{ChangeEvent, ChangeKind};
use treewatch::emit::sink::EventSink;
use treewatch::watch::watcher::TreeWatcher;

// ──────────────────── CLI test runner ────────────────────

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_twatch") {
        let p = PathBuf::from(path);
        if p.exists() {
            return p;
        }
    }

    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join("twatch"));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!(
            "unable to resolve twatch binary path for integration test (checked CARGO_BIN_EXE_twatch and debug sibling path)"
        ),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("twatch-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env_remove("TWATCH_CONFIG")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute twatch command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

// ──────────────────── CollectingSink ────────────────────

/// Sink that records every emitted event for later assertions.
#[derive(Clone, Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.snapshot().iter().map(|e| e.kind).collect()
    }

    pub fn contains(&self, kind: ChangeKind, path: &Path) -> bool {
        self.snapshot()
            .iter()
            .any(|e| e.kind == kind && e.path == path)
    }

    pub fn contains_kind(&self, kind: ChangeKind) -> bool {
        self.snapshot().iter().any(|e| e.kind == kind)
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: ChangeEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ──────────────────── stepping helpers ────────────────────

/// Drive the watcher one step at a time until the sink satisfies the
/// predicate. The filesystem operations producing the expected events must
/// already have happened, so each step has kernel records to drain.
pub fn step_until(
    watcher: &mut TreeWatcher,
    sink: &CollectingSink,
    what: &str,
    pred: impl Fn(&CollectingSink) -> bool,
) {
    for _ in 0..64 {
        if pred(sink) {
            return;
        }
        watcher.step().expect("watcher step");
    }
    panic!("never observed {what}; events: {:?}", sink.snapshot());
}
