#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use liveclass_api::auth::jwt::{generate_access_token, JwtConfig};
use liveclass_api::config::ServerConfig;
use liveclass_api::routes;
use liveclass_api::state::AppState;
use liveclass_api::ws::WsManager;
use liveclass_core::roles::Role;
use liveclass_core::types::DbId;
use liveclass_db::{Datastore, MemoryStore};
use liveclass_events::EventBus;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        ws_heartbeat_secs: 30,
        database_url: None,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// A seeded user and a bearer token for them.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: DbId,
    pub token: String,
}

/// The router plus direct handles on its state and seeded users.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub admin: TestUser,
    pub faculty: TestUser,
    /// Faculty in the same college who owns nothing.
    pub other_faculty: TestUser,
    pub student: TestUser,
    pub other_student: TestUser,
}

async fn seed(memory: &MemoryStore, config: &JwtConfig, name: &str, role: Role) -> TestUser {
    let email = format!("{}@example.edu", name.to_lowercase());
    let user = memory.insert_user(name, &email, role, 1).await;
    let token = generate_access_token(user.id, role.as_str(), 1, config).unwrap();
    TestUser { id: user.id, token }
}

/// Build the full application on the in-memory store, with all middleware
/// layers.
///
/// This mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses.
pub async fn build_test_app() -> TestApp {
    let config = test_config();
    let memory = Arc::new(MemoryStore::new());

    let admin = seed(&memory, &config.jwt, "Root", Role::Admin).await;
    let faculty = seed(&memory, &config.jwt, "Grace", Role::Faculty).await;
    let other_faculty = seed(&memory, &config.jwt, "Barbara", Role::Faculty).await;
    let student = seed(&memory, &config.jwt, "Ada", Role::Student).await;
    let other_student = seed(&memory, &config.jwt, "Alan", Role::Student).await;

    let state = AppState::new(
        Datastore::in_memory(memory),
        Arc::new(config),
        Arc::new(WsManager::new()),
        Arc::new(EventBus::default()),
    );

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let router = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state.clone());

    TestApp {
        router,
        state,
        admin,
        faculty,
        other_faculty,
        student,
        other_student,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response {
    send(app, Method::GET, uri, token, None).await
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn post(app: &Router, uri: &str, token: &str) -> Response {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn put_json(app: &Router, uri: &str, token: &str, body: serde_json::Value) -> Response {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete(app: &Router, uri: &str, token: &str) -> Response {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn delete_json(
    app: &Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response {
    send(app, Method::DELETE, uri, Some(token), Some(body)).await
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Schedule a session owned by `app.faculty`, returning its id.
pub async fn create_session(app: &TestApp, settings: serde_json::Value) -> DbId {
    let start = chrono::Utc::now() + chrono::Duration::hours(1);
    let response = post_json(
        &app.router,
        "/api/v1/sessions",
        &app.faculty.token,
        serde_json::json!({
            "title": "Distributed Systems",
            "subject": "CS",
            "scheduled_start": start,
            "duration_minutes": 90,
            "settings": settings,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

/// A live session with both students enrolled and `app.student` joined.
pub async fn live_session(app: &TestApp) -> DbId {
    let id = create_session(app, serde_json::json!({})).await;
    let response = post_json(
        &app.router,
        &format!("/api/v1/sessions/{id}/enroll"),
        &app.faculty.token,
        serde_json::json!({ "student_ids": [app.student.id, app.other_student.id] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post(
        &app.router,
        &format!("/api/v1/sessions/{id}/start"),
        &app.faculty.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post(
        &app.router,
        &format!("/api/v1/sessions/{id}/join"),
        &app.student.token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    id
}
