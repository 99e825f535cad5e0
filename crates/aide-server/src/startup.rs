//! Process lifespan: settings, logging, database, serve, shut down.

use crate::{app, entities, logging, AppState};
use aide_config::{ConfigError, OverrideFile, Settings};
use aide_db::{DbError, SessionFactory};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

/// Errors that abort startup. Each is reported to the operator as-is.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Settings could not be resolved or directories could not be created.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The database engine could not be built or the schema created.
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// The log file could not be opened for appending.
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The tracing subscriber could not be installed.
    #[error("failed to initialize logging: {0}")]
    Logging(String),

    /// The listener could not bind.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// The server stopped with an I/O error.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Runs the service until SIGINT/SIGTERM.
///
/// Order matters: settings are resolved and directories created before
/// logging opens its file, and the schema exists before the first request
/// is accepted. The database layer gets no explicit teardown.
///
/// # Errors
///
/// Any [`StartupError`]; nothing is retried.
pub async fn run(override_file: &Path, override_source: &'static str) -> Result<(), StartupError> {
    let (settings, override_status) = Settings::load(Some(override_file))?;
    logging::init_logging(&settings)?;

    tracing::info!(
        source = override_source,
        path = %override_file.display(),
        "resolved override file"
    );
    log_override_file(&override_status);
    tracing::info!(
        app = %settings.app_name,
        version = %settings.app_version,
        environment = %settings.environment,
        debug = settings.debug,
        "starting"
    );

    let db = SessionFactory::from_settings(&settings, entities())?;
    db.create_schema()?;
    tracing::info!(
        tables = db.metadata().tables().len(),
        "database tables created"
    );

    let addr = SocketAddr::new(settings.host, settings.port);
    let state = AppState {
        settings: Arc::new(settings),
        db,
    };

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)?;

    tracing::info!("shut down");
    Ok(())
}

fn log_override_file(status: &OverrideFile) {
    match status {
        OverrideFile::NotRequested => {}
        OverrideFile::NotFound(path) => {
            tracing::info!(path = %path.display(), "override file not found, skipping");
        }
        OverrideFile::Loaded { path, entries } => {
            tracing::info!(path = %path.display(), entries, "override file loaded");
        }
    }
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
///
/// If a handler cannot be installed, that signal is simply never awaited.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
