//! HTTP request handlers

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream};
use http::StatusCode;
use serde::Serialize;
use tracing::error;

use crate::deploy::state::DeploymentState;
use crate::errors::DeployError;
use crate::models::deployment::DeploymentRecord;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for DeployError {
    fn into_response(self) -> Response {
        let status = match &self {
            DeployError::NotFound(_) => StatusCode::NOT_FOUND,
            DeployError::AlreadyDeploying(_) => StatusCode::CONFLICT,
            DeployError::ConfigError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deployer".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// A configured project and its current deployment
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub name: String,
    pub path: String,
    pub state: DeploymentState,
}

/// Projects handler
pub async fn projects_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let projects: Vec<ProjectSummary> = state
        .app
        .pipelines()
        .map(|pipeline| ProjectSummary {
            name: pipeline.project().name.clone(),
            path: pipeline.project().path.to_string_lossy().into_owned(),
            state: pipeline.state(),
        })
        .collect();
    Json(projects)
}

/// Current deployment state of a project
pub async fn state_handler(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Result<Json<DeploymentState>, DeployError> {
    let pipeline = state.app.pipeline(&name)?;
    Ok(Json(pipeline.state()))
}

/// Server-sent `state` events: the current snapshot, then one per change
pub async fn state_stream_handler(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, DeployError> {
    let rx = state.app.pipeline(&name)?.reader().into_receiver();

    let events = stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let snapshot = rx.borrow_and_update().clone();
        let event = Event::default()
            .event("state")
            .json_data(&snapshot)
            .unwrap_or_else(|_| Event::default().event("state"));
        Some((Ok(event), (rx, false)))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Start a deployment in the background.
///
/// Answers `202` with the fresh state, or `409` while one is in flight.
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, DeployError> {
    let pipeline = state.app.pipeline(&name)?;
    pipeline.spawn(state.credential.clone())?;
    Ok((StatusCode::ACCEPTED, Json(pipeline.state())))
}

/// Cancel response
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Cancel the in-flight deployment of a project
pub async fn cancel_handler(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Result<Json<CancelResponse>, DeployError> {
    let pipeline = state.app.pipeline(&name)?;
    Ok(Json(CancelResponse {
        cancelled: pipeline.cancel(),
    }))
}

/// Deployment history, newest first
pub async fn history_handler(State(state): State<Arc<ServerState>>) -> Json<Vec<DeploymentRecord>> {
    Json(state.app.history.list())
}

/// Delete a history record
pub async fn delete_history_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, DeployError> {
    state.app.history.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
