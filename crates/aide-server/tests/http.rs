use aide_config::{Settings, Sources};
use aide_db::{Engine, EngineOptions, Metadata, SessionFactory};
use aide_server::{app, AppState};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn build_test_state(extra: &[(&str, &str)]) -> AppState {
    let mut env = vec![
        ("OPENAI_API_KEY", "sk-test"),
        ("ENVIRONMENT", "production"),
        ("APP_VERSION", "2.3.4"),
    ];
    env.extend_from_slice(extra);
    let settings = Settings::resolve(
        &Sources::from_pairs(Vec::<(&str, &str)>::new(), env),
        std::env::temp_dir(),
    )
    .unwrap();

    let engine = Engine::connect("sqlite://", EngineOptions::default()).unwrap();
    AppState {
        settings: Arc::new(settings),
        db: SessionFactory::new(engine, Metadata::new()),
    }
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn root_welcomes_with_app_metadata() {
    let (status, json) = get_json(app(build_test_state(&[])), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Welcome to AI Personal Assistant");
    assert_eq!(json["version"], "2.3.4");
    assert_eq!(json["environment"], "production");
}

#[tokio::test]
async fn health_reports_database_status() {
    let (status, json) = get_json(app(build_test_state(&[])), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["app_name"], "AI Personal Assistant");
    assert_eq!(json["version"], "2.3.4");
    assert_eq!(json["environment"], "production");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn unknown_routes_return_json_404() {
    let (status, json) = get_json(app(build_test_state(&[])), "/api/v1/chat").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["detail"], "The requested resource was not found");
}

#[tokio::test]
async fn configured_origin_passes_preflight_with_credentials() {
    let app = app(build_test_state(&[(
        "CORS_ORIGINS",
        r#"["https://assistant.example"]"#,
    )]));

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/health")
                .header(header::ORIGIN, "https://assistant.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://assistant.example"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
        "POST"
    );
}

#[tokio::test]
async fn unlisted_origin_gets_no_cors_grant() {
    let app = app(build_test_state(&[]));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "https://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn default_origins_are_allowed() {
    let app = app(build_test_state(&[]));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:3000"
    );
}

async fn preflight(app: Router, origin: &str) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/health")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn wildcard_origin_mirrors_the_caller_with_credentials() {
    let app = app(build_test_state(&[("CORS_ORIGINS", "*")]));

    let response = preflight(app, "https://anywhere.example").await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://anywhere.example"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn invalid_configured_origin_is_skipped() {
    let app = app(build_test_state(&[(
        "CORS_ORIGINS",
        "https://ok.example,bad\torigin\u{7f}",
    )]));

    let response = preflight(app.clone(), "https://ok.example").await;
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "https://ok.example"
    );

    let (status, json) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}
