// crates/clipdrop-ui/src/helpers/log.rs
//
// Logging setup for the binary.
//
// Release builds use `windows_subsystem = "windows"`, so a double-click
// launch has no console and stderr goes nowhere. Everything is written to a
// temp file instead; `--verbose` mirrors it to stderr for terminal runs.
//
// File:   %TEMP%\clipdrop.log (append-only)
// Filter: CLIPDROP_LOG, e.g. `CLIPDROP_LOG=clipdrop_media=debug`

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "CLIPDROP_LOG";
const DEFAULT_FILTER: &str = "clipdrop=info,clipdrop_core=info,clipdrop_media=info";

pub fn log_path() -> PathBuf {
    std::env::temp_dir().join("clipdrop.log")
}

/// Install the global subscriber. Never fails: if the log file cannot be
/// opened only the stderr layer (when requested) is installed.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path())
        .ok()
        .map(|f| fmt::layer().with_ansi(false).with_writer(Mutex::new(f)));

    let stderr = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file)
        .with(stderr)
        .try_init();
}
