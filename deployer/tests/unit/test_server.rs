//! Local status server tests

mod support;

use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use deployer::app::state::AppState;
use deployer::server::serve::router;
use deployer::server::state::ServerState;

use support::{remote, token, FakeBuild, Harness};

fn app(state: Arc<AppState>) -> Router {
    router(Arc::new(ServerState::new(state, token())))
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Wait until the project has no attempt in flight
async fn settle(state: &AppState, project: &str) {
    let mut reader = state.pipeline(project).unwrap().reader();
    while reader.snapshot().is_deploying {
        reader.changed().await.unwrap();
    }
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::new("blog").await;
    let app = app(Arc::new(harness.app_state()));

    let (status, body) = send(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "deployer");

    let (status, body) = send(&app, "GET", "/version").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["git_hash"].as_str().unwrap().is_empty());
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    // Stamped by the build script as RFC 3339
    let built = body["build_time"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(built).is_ok());

    harness.cleanup().await;
}

#[tokio::test]
async fn test_projects_and_state() {
    let harness = Harness::new("blog").await;
    let app = app(Arc::new(harness.app_state()));

    let (status, body) = send(&app, "GET", "/projects").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "blog");
    assert_eq!(body[0]["state"]["phase"], "idle");
    assert_eq!(body[0]["state"]["isDeploying"], false);

    let (status, body) = send(&app, "GET", "/projects/blog/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["buildError"], Value::Null);

    let (status, body) = send(&app, "GET", "/projects/missing/state").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));

    harness.cleanup().await;
}

#[tokio::test]
async fn test_deploy_then_history() {
    let harness = Harness::new("blog").await;
    harness
        .provider
        .push_status(Ok(remote("ready", Some("https://blog.example.app"))));
    let state = Arc::new(harness.app_state());
    let app = app(state.clone());

    let (status, body) = send(&app, "POST", "/projects/blog/deploy").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["isDeploying"], true);

    settle(&state, "blog").await;

    let (_, body) = send(&app, "GET", "/projects/blog/state").await;
    assert_eq!(body["phase"], "succeeded");
    assert_eq!(body["isBuildReady"], true);

    let (status, body) = send(&app, "GET", "/history").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["status"], "success");
    assert_eq!(body[0]["url"], "https://blog.example.app");

    let id = body[0]["id"].as_str().unwrap().to_string();
    let (status, _) = send(&app, "DELETE", &format!("/history/{}", id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", &format!("/history/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    harness.cleanup().await;
}

#[tokio::test]
async fn test_conflict_and_cancel() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = Harness::with_build("blog", FakeBuild::gated(gate)).await;
    let state = Arc::new(harness.app_state());
    let app = app(state.clone());

    let (status, _) = send(&app, "POST", "/projects/blog/deploy").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send(&app, "POST", "/projects/blog/deploy").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already in progress"));

    let (status, body) = send(&app, "POST", "/projects/blog/cancel").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], true);

    settle(&state, "blog").await;
    let (_, body) = send(&app, "GET", "/projects/blog/state").await;
    assert_eq!(body["phase"], "cancelled");
    assert_eq!(body["error"], Value::Null);

    let (_, body) = send(&app, "POST", "/projects/blog/cancel").await;
    assert_eq!(body["cancelled"], false);

    harness.cleanup().await;
}

#[tokio::test]
async fn test_state_stream_is_event_stream() {
    let harness = Harness::new("blog").await;
    let app = app(Arc::new(harness.app_state()));

    let request = Request::builder()
        .uri("/projects/blog/state/stream")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));

    let mut body = response.into_body();
    let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
    let text = String::from_utf8_lossy(&first);
    assert!(text.contains("event: state"));
    assert!(text.contains("\"phase\":\"idle\""));

    harness.cleanup().await;
}
