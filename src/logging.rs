//! Logging initialisation for som-explorer.
//!
//! Stderr output is always enabled, filtered by `RUST_LOG` (default `warn`).
//! When `SOM_EXPLORER_LOG=1`, log lines are also written to
//! `som-explorer.log` in the OS log directory and the default filter widens
//! to `info`, which includes per-run and per-epoch training events.
//!
//! Keep the returned guard alive for the duration of the process so that
//! buffered file output is flushed on exit.

use std::path::PathBuf;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_ENV: &str = "SOM_EXPLORER_LOG";
const LOG_FILE: &str = "som-explorer.log";
const APP_DIR: &str = "som-explorer";

pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialise the global tracing subscriber. Call once from `main`.
pub fn init() -> LogGuard {
    if std::env::var(LOG_ENV).as_deref() != Ok("1") {
        tracing_subscriber::registry()
            .with(filter("warn"))
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return LogGuard { _file_guard: None };
    }

    let dir = log_dir().unwrap_or_else(std::env::temp_dir);
    let _ = std::fs::create_dir_all(&dir);
    let (non_blocking, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, LOG_FILE));

    tracing_subscriber::registry()
        .with(filter("info"))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!(path = %dir.join(LOG_FILE).display(), "File logging enabled");
    LogGuard {
        _file_guard: Some(guard),
    }
}

fn log_dir() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join(APP_DIR));
    }
    let mut p = PathBuf::from(std::env::var("HOME").ok()?);
    #[cfg(target_os = "macos")]
    p.push("Library/Logs");
    #[cfg(not(target_os = "macos"))]
    p.push(".local/state");
    p.push(APP_DIR);
    Some(p)
}
