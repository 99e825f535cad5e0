//! Tracing subscriber setup: stdout plus an append-only log file.

use crate::StartupError;
use aide_config::Settings;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Maps conventional level names onto `EnvFilter` directives.
///
/// `WARNING` and `CRITICAL` are accepted alongside the tracing names, and any
/// other directive (e.g. `aide_db=debug,info`) passes through lowercased.
pub fn filter_directive(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        "notset" => "trace".to_string(),
        other => other.to_string(),
    }
}

/// Installs the global subscriber.
///
/// The log file's directory must already exist, which
/// [`Settings::ensure_directories`] guarantees.
///
/// # Errors
///
/// `StartupError::LogFile` if the log file cannot be opened, or
/// `StartupError::Logging` if a global subscriber is already installed.
pub fn init_logging(settings: &Settings) -> Result<(), StartupError> {
    let directive = filter_directive(&settings.log_level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let path = settings.base_dir.join(&settings.log_file);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| StartupError::LogFile { path, source })?;

    let stdout = if settings.log_json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };
    let file = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file)
        .try_init()
        .map_err(|e| StartupError::Logging(e.to_string()))
}
