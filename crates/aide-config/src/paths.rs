//! Path handling: database URL normalization and directory provisioning.

use crate::{ConfigError, Settings};
use std::path::{Component, Path, PathBuf};

impl Settings {
    /// Returns the database URL with a file-based path made absolute.
    ///
    /// For `sqlite` (and `sqlite+<driver>`) URLs, a relative path is joined
    /// onto [`Settings::base_dir`] with `.` components dropped, keeping the
    /// scheme prefix and any query string. In-memory and already-absolute
    /// URLs, and every other scheme, are returned unchanged. The result is
    /// stable under repeated application.
    pub fn resolved_database_url(&self) -> String {
        absolutize_sqlite_url(&self.database_url, &self.base_dir)
    }

    /// The directories that must exist before logging, credential loading or
    /// the vector store start writing.
    ///
    /// Bare filenames contribute nothing; duplicates are collapsed.
    pub fn directories(&self) -> Vec<PathBuf> {
        let candidates = [
            self.log_file.parent(),
            Some(self.chroma_persist_directory.as_path()),
            self.google_credentials_path.parent(),
            self.google_token_path.parent(),
        ];

        let mut dirs: Vec<PathBuf> = Vec::new();
        for dir in candidates.into_iter().flatten() {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let resolved = normalize(&self.base_dir.join(dir));
            if !dirs.contains(&resolved) {
                dirs.push(resolved);
            }
        }
        dirs
    }

    /// Creates every directory in [`Settings::directories`], including
    /// missing ancestors. Existing directories are left alone.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Directory` for the first directory that cannot
    /// be created.
    pub fn ensure_directories(&self) -> Result<Vec<PathBuf>, ConfigError> {
        let dirs = self.directories();
        for dir in &dirs {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Directory {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(dirs)
    }
}

/// `sqlite` or `sqlite+<driver>`, in any case.
fn is_sqlite_scheme(scheme: &str) -> bool {
    let base = scheme.split('+').next().unwrap_or(scheme);
    base.eq_ignore_ascii_case("sqlite")
}

fn absolutize_sqlite_url(url: &str, base_dir: &Path) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    if !is_sqlite_scheme(scheme) {
        return url.to_string();
    }

    // `sqlite:///relative` and `sqlite:////absolute`: one slash separates the
    // (empty) authority from the path.
    let Some(rest) = rest.strip_prefix('/') else {
        return url.to_string();
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };
    if path.is_empty() || path == ":memory:" {
        return url.to_string();
    }

    let absolute = normalize(&base_dir.join(path));
    let mut out = format!("{scheme}:///{}", absolute.display());
    if let Some(query) = query {
        out.push('?');
        out.push_str(query);
    }
    out
}

/// Lexically drops `.` components. `..` is kept as-is.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
