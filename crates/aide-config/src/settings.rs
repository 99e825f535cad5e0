//! The resolved, immutable settings object.

use crate::{ConfigError, OverrideFile, Sources};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

/// Resolved process configuration.
///
/// Construct with [`Settings::resolve`] (pure) or [`Settings::load`]
/// (process environment plus directory provisioning).
#[derive(Clone, PartialEq)]
pub struct Settings {
    /// Display name of the application.
    pub app_name: String,
    /// Application version reported by the HTTP surface.
    pub app_version: String,
    /// Environment mode, e.g. `development` or `production`.
    pub environment: String,
    /// Enables statement echo and verbose diagnostics.
    pub debug: bool,
    /// Secret used for signing. Redacted from `Debug` output.
    pub secret_key: String,

    /// Origins allowed to make cross-origin requests.
    pub cors_origins: Vec<String>,

    /// Raw database connection string. See [`Settings::resolved_database_url`].
    pub database_url: String,

    /// Credential for the external AI service. Required.
    pub openai_api_key: String,
    /// Model name passed to the AI service.
    pub ai_model: String,
    /// Generation temperature.
    pub ai_temperature: f64,
    /// Maximum tokens per generation.
    pub ai_max_tokens: u32,

    /// Path to the Google OAuth client credentials file.
    pub google_credentials_path: PathBuf,
    /// Path to the cached Google OAuth token.
    pub google_token_path: PathBuf,

    /// Directory where the vector store persists its data.
    pub chroma_persist_directory: PathBuf,
    /// Vector store collection name.
    pub chroma_collection_name: String,

    /// Log level filter, e.g. `INFO` or `aide_db=debug,info`.
    pub log_level: String,
    /// File that log output is appended to.
    pub log_file: PathBuf,
    /// Emit stdout logs as JSON.
    pub log_json: bool,

    /// Optional cache URL.
    pub redis_url: Option<String>,
    /// Optional background-task broker URL.
    pub celery_broker_url: Option<String>,
    /// Optional background-task result backend URL.
    pub celery_result_backend: Option<String>,

    /// IANA timezone name used for scheduling.
    pub timezone: String,

    /// Address the HTTP server binds to, read from `AIDE_HOST`.
    ///
    /// Prefixed so an inherited `HOST` (often a hostname) cannot collide.
    pub host: IpAddr,
    /// Port the HTTP server listens on, read from `AIDE_PORT`.
    pub port: u16,

    /// Working directory captured at resolution time. Relative paths are
    /// resolved against it.
    pub base_dir: PathBuf,
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:8000".to_string(),
    ]
}

impl Settings {
    /// Resolves settings from `sources`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `openai_api_key` is absent from every
    /// source, or `ConfigError::Invalid` if any supplied value is malformed.
    pub fn resolve(sources: &Sources, base_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let r = Reader { sources };

        Ok(Self {
            app_name: r.string("app_name", "AI Personal Assistant"),
            app_version: r.string("app_version", "1.0.0"),
            environment: r.string("environment", "development"),
            debug: r.parse_with("debug", true, parse_bool)?,
            secret_key: r.string("secret_key", "your-secret-key-here"),
            cors_origins: r.parse_with("cors_origins", default_cors_origins(), parse_list)?,
            database_url: r.string("database_url", "sqlite:///./ai_assistant.db"),
            openai_api_key: r.required("openai_api_key")?,
            ai_model: r.string("ai_model", "gpt-4o-mini"),
            ai_temperature: r.parse("ai_temperature", 0.7)?,
            ai_max_tokens: r.parse("ai_max_tokens", 1000)?,
            google_credentials_path: r.path("google_credentials_path", "credentials/google_credentials.json"),
            google_token_path: r.path("google_token_path", "credentials/google_token.json"),
            chroma_persist_directory: r.path("chroma_persist_directory", "./chroma_db"),
            chroma_collection_name: r.string("chroma_collection_name", "ai_assistant_memory"),
            log_level: r.string("log_level", "INFO"),
            log_file: r.path("log_file", "logs/ai_assistant.log"),
            log_json: r.parse_with("log_json", false, parse_bool)?,
            redis_url: r.optional("redis_url"),
            celery_broker_url: r.optional("celery_broker_url"),
            celery_result_backend: r.optional("celery_result_backend"),
            timezone: r.string("timezone", "America/New_York"),
            host: r.parse("aide_host", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: r.parse("aide_port", 8000)?,
            base_dir: base_dir.into(),
        })
    }

    /// Resolves settings from the process environment and `override_file`,
    /// then creates the required directories.
    ///
    /// This is the single startup entry point: call it once, before building
    /// anything that writes to the log, credential or vector-store
    /// directories. The returned [`OverrideFile`] says whether the file was
    /// read, so it can be logged once logging is up.
    ///
    /// # Errors
    ///
    /// Any resolution error, or `ConfigError::Directory` if provisioning fails.
    pub fn load(override_file: Option<&Path>) -> Result<(Self, OverrideFile), ConfigError> {
        let sources = Sources::from_process(override_file)?;
        let cwd = std::env::current_dir().map_err(ConfigError::WorkingDir)?;
        let settings = Self::resolve(&sources, cwd)?;
        settings.ensure_directories()?;
        Ok((settings, sources.override_file().clone()))
    }

    /// `true` if the environment mode is `development`, ignoring case.
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// `true` if the environment mode is `production`, ignoring case.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("app_name", &self.app_name)
            .field("app_version", &self.app_version)
            .field("environment", &self.environment)
            .field("debug", &self.debug)
            .field("secret_key", &"[REDACTED]")
            .field("cors_origins", &self.cors_origins)
            .field("database_url", &self.database_url)
            .field("openai_api_key", &"[REDACTED]")
            .field("ai_model", &self.ai_model)
            .field("ai_temperature", &self.ai_temperature)
            .field("ai_max_tokens", &self.ai_max_tokens)
            .field("google_credentials_path", &self.google_credentials_path)
            .field("google_token_path", &self.google_token_path)
            .field("chroma_persist_directory", &self.chroma_persist_directory)
            .field("chroma_collection_name", &self.chroma_collection_name)
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .field("log_json", &self.log_json)
            .field("redis_url", &self.redis_url)
            .field("celery_broker_url", &self.celery_broker_url)
            .field("celery_result_backend", &self.celery_result_backend)
            .field("timezone", &self.timezone)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

struct Reader<'a> {
    sources: &'a Sources,
}

impl Reader<'_> {
    fn string(&self, field: &'static str, default: &str) -> String {
        self.sources.get(field).unwrap_or(default).to_string()
    }

    fn path(&self, field: &'static str, default: &str) -> PathBuf {
        PathBuf::from(self.sources.get(field).unwrap_or(default))
    }

    fn optional(&self, field: &'static str) -> Option<String> {
        self.sources
            .get(field)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
    }

    fn required(&self, field: &'static str) -> Result<String, ConfigError> {
        self.sources
            .get(field)
            .map(str::to_string)
            .ok_or(ConfigError::Missing(field))
    }

    fn parse<T>(&self, field: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: fmt::Display,
    {
        self.parse_with(field, default, |raw| {
            raw.trim().parse::<T>().map_err(|e| e.to_string())
        })
    }

    fn parse_with<T>(
        &self,
        field: &'static str,
        default: T,
        parser: impl FnOnce(&str) -> Result<T, String>,
    ) -> Result<T, ConfigError> {
        match self.sources.get(field) {
            Some(raw) => parser(raw).map_err(|reason| ConfigError::Invalid {
                field,
                value: raw.to_string(),
                reason,
            }),
            None => Ok(default),
        }
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        _ => Err("expected a boolean".to_string()),
    }
}

/// Accepts a JSON array of strings or a comma-separated list.
fn parse_list(raw: &str) -> Result<Vec<String>, String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| e.to_string());
    }
    Ok(trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}
