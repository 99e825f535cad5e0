//! Layered key/value sources consulted during resolution.

use crate::ConfigError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// What happened to the override file while sources were read.
///
/// Reading happens before logging is installed, so the caller reports this
/// once a subscriber exists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OverrideFile {
    /// No override file was requested.
    #[default]
    NotRequested,
    /// The file does not exist and was skipped.
    NotFound(PathBuf),
    /// The file was read.
    Loaded { path: PathBuf, entries: usize },
}

/// Raw setting values keyed by lowercase name.
///
/// Override-file entries are folded in first and environment variables
/// second, so a variable always wins over a file entry whose name differs
/// only in case.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    values: HashMap<String, String>,
    override_file: OverrideFile,
}

impl Sources {
    /// Builds sources from explicit override-file and environment pairs.
    pub fn from_pairs<F, E, K, V>(file: F, env: E) -> Self
    where
        F: IntoIterator<Item = (K, V)>,
        E: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut values = HashMap::new();
        for (key, value) in file.into_iter().chain(env) {
            values.insert(key.as_ref().to_ascii_lowercase(), value.into());
        }
        Self {
            values,
            override_file: OverrideFile::NotRequested,
        }
    }

    /// Reads the override file (if given and present) and the process
    /// environment.
    ///
    /// A missing override file is not an error; it is recorded as
    /// [`OverrideFile::NotFound`]. Environment entries whose name or value is
    /// not valid UTF-8 are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::OverrideFile` if the file exists but cannot be
    /// read or contains a malformed line.
    pub fn from_process(override_file: Option<&Path>) -> Result<Self, ConfigError> {
        let (file, status) = match override_file {
            Some(path) => match read_override_file(path)? {
                Some(entries) => {
                    let status = OverrideFile::Loaded {
                        path: path.to_path_buf(),
                        entries: entries.len(),
                    };
                    (entries, status)
                }
                None => (Vec::new(), OverrideFile::NotFound(path.to_path_buf())),
            },
            None => (Vec::new(), OverrideFile::NotRequested),
        };
        let env = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));

        let mut sources = Self::from_pairs(file, env);
        sources.override_file = status;
        Ok(sources)
    }

    /// How the override file was handled.
    pub fn override_file(&self) -> &OverrideFile {
        &self.override_file
    }

    /// Looks up a value by field name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// `Ok(None)` when the file does not exist.
fn read_override_file(path: &Path) -> Result<Option<Vec<(String, String)>>, ConfigError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return Ok(None),
        Err(source) => {
            return Err(ConfigError::OverrideFile {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    iter.collect::<Result<Vec<_>, _>>()
        .map(Some)
        .map_err(|source| ConfigError::OverrideFile {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let sources = Sources::from_pairs(
            Vec::<(&str, &str)>::new(),
            vec![("Database_URL", "postgres://db/app")],
        );
        assert_eq!(sources.get("database_url"), Some("postgres://db/app"));
        assert_eq!(sources.get("DATABASE_URL"), Some("postgres://db/app"));
    }

    #[test]
    fn env_wins_over_file_across_case() {
        let sources = Sources::from_pairs(
            vec![("log_level", "DEBUG")],
            vec![("LOG_LEVEL", "WARNING")],
        );
        assert_eq!(sources.get("log_level"), Some("WARNING"));
    }

    #[test]
    fn missing_override_file_is_reported_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.env");
        assert_eq!(read_override_file(&path).unwrap(), None);

        let sources = Sources::from_process(Some(&path)).unwrap();
        assert_eq!(sources.override_file(), &OverrideFile::NotFound(path));
    }

    #[test]
    fn loaded_override_file_reports_its_entry_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "AIDE_SOURCES_TEST_A=1\nAIDE_SOURCES_TEST_B=2\n").unwrap();

        let sources = Sources::from_process(Some(&path)).unwrap();
        assert_eq!(
            sources.override_file(),
            &OverrideFile::Loaded { path, entries: 2 }
        );
        assert_eq!(sources.get("aide_sources_test_b"), Some("2"));
    }

    #[test]
    fn explicit_pairs_have_no_override_file() {
        let sources = Sources::from_pairs(vec![("a", "1")], Vec::<(&str, &str)>::new());
        assert_eq!(sources.override_file(), &OverrideFile::NotRequested);
    }

    #[test]
    fn override_file_entries_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "OPENAI_API_KEY=sk-file\n# comment\nTIMEZONE=UTC\n").unwrap();

        let entries = read_override_file(&path).unwrap().unwrap();
        assert!(entries.contains(&("OPENAI_API_KEY".to_string(), "sk-file".to_string())));
        assert!(entries.contains(&("TIMEZONE".to_string(), "UTC".to_string())));
    }
}
