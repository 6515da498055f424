#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use hearing_api::auth::jwt::{generate_access_token, JwtConfig};
use hearing_api::config::ServerConfig;
use hearing_api::router::build_app_router;
use hearing_api::state::AppState;
use hearing_core::composer::HearingComposer;
use hearing_core::memory::InMemoryHearingRepository;
use hearing_core::translation::SupportedLanguages;
use hearing_core::types::DbId;

/// Organization owning the hearings created by [`staff_token`].
pub const ORG: DbId = 10;
pub const OTHER_ORG: DbId = 20;

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
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
        languages: SupportedLanguages::default(),
    }
}

/// Build the full application router over an in-memory hearing store.
///
/// The returned repository handle lets tests seed labels and inspect stored
/// aggregates, soft-deleted parts included.
pub fn build_test_app() -> (Router, Arc<InMemoryHearingRepository>) {
    let config = test_config();
    let repo = Arc::new(InMemoryHearingRepository::new());
    let composer = HearingComposer::new(repo.clone(), config.languages.clone());

    let state = AppState {
        composer: Arc::new(composer),
        config: Arc::new(config.clone()),
    };

    (build_app_router(state), repo)
}

pub fn token(user_id: DbId, organization: Option<DbId>, is_admin: bool) -> String {
    generate_access_token(user_id, organization, is_admin, &test_config().jwt)
        .expect("token generation should succeed")
}

/// Staff member of [`ORG`].
pub fn staff_token() -> String {
    token(1, Some(ORG), false)
}

/// Staff member of [`OTHER_ORG`].
pub fn outsider_token() -> String {
    token(2, Some(OTHER_ORG), false)
}

pub fn no_org_token() -> String {
    token(3, None, false)
}

pub fn admin_token() -> String {
    token(4, None, true)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<&Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response {
    send(app, Method::GET, uri, token, None).await
}

pub async fn post_json(app: &Router, uri: &str, token: Option<&str>, body: &Value) -> Response {
    send(app, Method::POST, uri, token, Some(body)).await
}

pub async fn put_json(app: &Router, uri: &str, token: Option<&str>, body: &Value) -> Response {
    send(app, Method::PUT, uri, token, Some(body)).await
}

pub async fn patch_json(app: &Router, uri: &str, token: Option<&str>, body: &Value) -> Response {
    send(app, Method::PATCH, uri, token, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str, token: Option<&str>) -> Response {
    send(app, Method::DELETE, uri, token, None).await
}

/// Status plus parsed JSON body (`Value::Null` for an empty body).
pub async fn body_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
