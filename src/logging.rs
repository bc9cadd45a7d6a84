use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::defs::{APP_DIR, LOG_FILE_NAME};

pub fn logs_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        Path::new(&xdg).join(APP_DIR).join("logs")
    } else if let Ok(home) = std::env::var("HOME") {
        Path::new(&home)
            .join(".local/state")
            .join(APP_DIR)
            .join("logs")
    } else {
        std::env::temp_dir().join(APP_DIR).join("logs")
    }
}

/// Console goes to stderr so stdout only ever carries the result record.
/// The returned guard flushes the file writer and must outlive the run.
pub fn init_logging() -> io::Result<WorkerGuard> {
    let dir = logs_dir();
    fs::create_dir_all(&dir)?;

    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE_NAME))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
