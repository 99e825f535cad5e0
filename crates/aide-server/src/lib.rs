//! Aide server library logic: router, shared state and startup lifecycle.

pub mod logging;
pub mod startup;

use aide_config::Settings;
use aide_db::{Metadata, SessionFactory};
use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use startup::{run, StartupError};

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Resolved process configuration.
    pub settings: Arc<Settings>,
    /// Session factory over the process-wide database engine.
    pub db: SessionFactory,
}

/// Entity definitions materialized at startup.
///
/// The chat, task and user routers that would register tables here do not
/// exist yet, so the registry is empty.
pub fn entities() -> Metadata {
    Metadata::new()
}

#[derive(Debug, Serialize)]
struct RootResponse {
    message: String,
    version: String,
    environment: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    app_name: String,
    version: String,
    environment: String,
    database: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    detail: &'static str,
}

/// Handler for `GET /`.
async fn root(Extension(state): Extension<Arc<AppState>>) -> Json<RootResponse> {
    let settings = &state.settings;
    Json(RootResponse {
        message: format!("Welcome to {}", settings.app_name),
        version: settings.app_version.clone(),
        environment: settings.environment.clone(),
    })
}

/// Handler for `GET /health`.
///
/// Always `200 OK`; the `database` field reports whether a `SELECT 1`
/// round-trip through a fresh session succeeded.
async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<HealthResponse> {
    let db = state.db.clone();
    let probe =
        tokio::task::spawn_blocking(move || db.with_session(|s| s.query_one("SELECT 1", &[])))
            .await;

    let database = match probe {
        Ok(Ok(_)) => "ok",
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "database health probe failed");
            "unavailable"
        }
        Err(e) => {
            tracing::error!(error = %e, "database health probe task failed");
            "unavailable"
        }
    };

    let settings = &state.settings;
    Json(HealthResponse {
        status: "healthy",
        app_name: settings.app_name.clone(),
        version: settings.app_version.clone(),
        environment: settings.environment.clone(),
        database,
    })
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            detail: "The requested resource was not found",
        }),
    )
}

fn internal_error(_panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            detail: "Internal server error occurred",
        }),
    )
        .into_response()
}

/// CORS policy from the configured origins.
///
/// Credentials are allowed, so methods and headers mirror the request rather
/// than using a literal wildcard. A `*` origin mirrors the request origin.
/// Origins that are not valid header values are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AllowOrigin::mirror_request());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "skipping invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.cors_origins);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(internal_error))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(Arc::new(state)))
}
