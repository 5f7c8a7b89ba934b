//! Shared logging setup for Sublime binaries.
//!
//! Two layers on one registry: a daily rolling file under
//! `~/.sublime/logs` and a console layer on stderr. `RUST_LOG` overrides the
//! default filter for both.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "sublime=info,sublime_sandbox=info,sublime_intent=info";
const HOME_ENV: &str = "SUBLIME_HOME";
const HOME_DIR_NAME: &str = ".sublime";

/// Logging configuration shared by Sublime binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
}

/// Keeps the background file writer alive. Drop it last, on shutdown.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize tracing with a rolling file writer and stderr output.
///
/// A log directory that cannot be created downgrades to console-only logging
/// rather than failing startup.
pub fn init_logging(config: LogConfig<'_>) -> Result<LogGuard> {
    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        EnvFilter::new(verbose_filter())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let mut guard = None;
    let file_layer = match ensure_logs_dir() {
        Ok(dir) => {
            let appender =
                tracing_appender::rolling::daily(dir, log_file_name(config.app_name));
            let (writer, worker_guard) = tracing_appender::non_blocking(appender);
            guard = Some(worker_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(file_filter),
            )
        }
        Err(err) => {
            eprintln!("Warning: failed to create logs directory: {:#}", err);
            None
        }
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LogGuard { _file: guard })
}

/// Sublime home directory: `$SUBLIME_HOME`, else `~/.sublime`.
pub fn sublime_home() -> PathBuf {
    home_from(std::env::var(HOME_ENV).ok().as_deref(), dirs::home_dir())
}

/// Logs directory: `<home>/logs`.
pub fn logs_dir() -> PathBuf {
    sublime_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

fn home_from(override_path: Option<&str>, user_home: Option<PathBuf>) -> PathBuf {
    if let Some(path) = override_path.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    user_home
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join(HOME_DIR_NAME)
}

fn verbose_filter() -> String {
    DEFAULT_LOG_FILTER.replace("=info", "=debug")
}

fn log_file_name(app_name: &str) -> String {
    let sanitized: String = app_name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect();
    format!("{}.log", sanitized)
}
