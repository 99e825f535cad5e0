//! Process configuration for the Aide service.
//!
//! Settings are resolved once at startup from three layers, highest
//! precedence first:
//!
//! 1. process environment variables,
//! 2. an optional dotenv-style override file (`.env` by default),
//! 3. hard-coded defaults.
//!
//! Variable names are matched case-insensitively against field names, so
//! `DATABASE_URL`, `database_url` and `Database_Url` all set
//! [`Settings::database_url`]. The only required field is
//! [`Settings::openai_api_key`]. The listener address is the exception to
//! the name mapping: it is read from `AIDE_HOST`/`AIDE_PORT`.
//!
//! The resolved [`Settings`] value is immutable. It is handed to the
//! components that need it rather than stored in a global.

mod error;
mod paths;
mod settings;
mod sources;

pub use error::ConfigError;
pub use settings::Settings;
pub use sources::{OverrideFile, Sources};
