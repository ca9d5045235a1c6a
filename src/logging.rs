use std::env;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Set to 1/true/yes to force debug logging regardless of RUST_LOG
pub const DEBUG_LOG_ENV: &str = "STUDY_TRACKER_DEBUG_LOG";

fn debug_requested(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes" | "YES"))
}

pub fn env_filter(force_debug: bool) -> EnvFilter {
    let env_debug = debug_requested(env::var(DEBUG_LOG_ENV).ok().as_deref());
    if force_debug || env_debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Route tracing output to `log_path`; the terminal belongs to the UI.
/// Keep the returned guard alive until exit so buffered lines get flushed.
pub fn init_logging(log_path: &Path, force_debug: bool) -> io::Result<WorkerGuard> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    // A subscriber may already be installed (tests); keep the existing one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(force_debug))
        .with_writer(writer)
        .with_ansi(false)
        .try_init();

    Ok(guard)
}
