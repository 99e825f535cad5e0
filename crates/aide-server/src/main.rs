//! Aide server binary.
//!
//! Usage: `aide-server [OVERRIDE_FILE]`. The override file defaults to
//! `$AIDE_ENV_FILE`, then `.env` in the working directory.

use std::path::PathBuf;
use std::process::ExitCode;

fn resolve_override_file() -> (PathBuf, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (PathBuf::from(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("AIDE_ENV_FILE") {
        if !path.trim().is_empty() {
            return (PathBuf::from(path), "env-var");
        }
    }

    (PathBuf::from(".env"), "default")
}

#[tokio::main]
async fn main() -> ExitCode {
    let (override_file, source) = resolve_override_file();

    match aide_server::run(&override_file, source).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("aide-server: {e}");
            ExitCode::FAILURE
        }
    }
}
