//! The session factory: scoped session acquisition and schema lifecycle.

use crate::{DbError, Engine, Metadata, Session};
use aide_config::Settings;
use std::sync::Arc;

/// Hands out sessions over one [`Engine`] and owns the entity registry.
///
/// Cloning is cheap. Share one factory across request handlers; each unit
/// of work takes its own session.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    engine: Engine,
    metadata: Arc<Metadata>,
}

impl SessionFactory {
    /// Wraps an engine and the entity definitions its schema is built from.
    pub fn new(engine: Engine, metadata: Metadata) -> Self {
        Self {
            engine,
            metadata: Arc::new(metadata),
        }
    }

    /// Builds the engine from settings and wraps it.
    ///
    /// # Errors
    ///
    /// Any engine construction error; see [`Engine::connect`].
    pub fn from_settings(settings: &Settings, metadata: Metadata) -> Result<Self, DbError> {
        Ok(Self::new(Engine::from_settings(settings)?, metadata))
    }

    /// The underlying engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The registered entity definitions.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Opens a fresh session. The caller owns it and must let it drop (or
    /// call [`Session::close`]) when the unit of work ends.
    ///
    /// On a file-based engine sessions share one connection and take turns:
    /// this call blocks while another session is open, for up to
    /// [`EngineOptions::connection_timeout`](crate::EngineOptions::connection_timeout).
    /// Do not open a second session on a thread that still holds one; it
    /// cannot be granted until the first is released.
    ///
    /// # Errors
    ///
    /// `DbError::Acquire` if no connection becomes available in time.
    pub fn new_session(&self) -> Result<Session, DbError> {
        self.engine.session()
    }

    /// Runs `work` with a session borrowed for its duration.
    ///
    /// The session is released when `work` returns, whether it succeeded,
    /// failed, or panicked. Anything `work` did not commit is rolled back.
    pub fn with_session<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Session) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut session = self.new_session()?;
        work(&mut session)
    }

    /// Creates all registered tables that do not exist yet.
    pub fn create_schema(&self) -> Result<(), DbError> {
        self.with_session(|session| self.metadata.create_all(session))
    }

    /// Drops every registered table and its data. Irreversible: meant for
    /// tests and resets, never for a serving process.
    pub fn drop_schema(&self) -> Result<(), DbError> {
        tracing::warn!(
            tables = self.metadata.tables().len(),
            "dropping all registered tables"
        );
        self.with_session(|session| self.metadata.drop_all(session))
    }
}
