//! API routes for oced

use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use oce_common::error::Result as OceResult;
use oce_common::{
    ErrorBody, ErrorDetail, NoteWrite, NotesResponse, OceError, PurgeResponse, RunRequest,
    RunResponse, SessionNote,
};
use std::sync::Arc;
use tracing::{error, info};

type AppStateArc = Arc<AppState>;

/// JSON error response: `{"error": {"code", "message"}}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: ErrorDetail {
                    code,
                    message: message.into(),
                },
            },
        }
    }
}

impl From<OceError> for ApiError {
    fn from(err: OceError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!("  Request failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            body: ErrorBody::from(&err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let err = OceError::MalformedRequest(rejection.body_text());
        Self::new(StatusCode::BAD_REQUEST, err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Run blocking store/engine work off the async runtime
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> OceResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| OceError::Internal(format!("worker task failed: {}", e)))?
        .map_err(ApiError::from)
}

fn require_project(project_id: &str) -> Result<String, ApiError> {
    let project_id = project_id.trim();
    if project_id.is_empty() {
        return Err(OceError::MalformedRequest("project_id must not be blank".to_string()).into());
    }
    Ok(project_id.to_string())
}

// ============================================================================
// Health
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health))
}

/// Liveness only: 200 with no body
async fn health() -> StatusCode {
    StatusCode::OK
}

// ============================================================================
// Pipeline
// ============================================================================

pub fn run_routes() -> Router<AppStateArc> {
    Router::new().route("/run_oce", post(run_oce))
}

async fn run_oce(
    State(state): State<AppStateArc>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Json<RunResponse>, ApiError> {
    let Json(request) = payload?;
    info!(
        "  /run_oce: {} chars, project={}",
        request.text.chars().count(),
        request.effective_project_id().unwrap_or("-")
    );

    let engine = state.engine.clone();
    let response = blocking(move || engine.run(&request)).await?;
    Ok(Json(response))
}

// ============================================================================
// Session notes
// ============================================================================

pub fn notes_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/notes", delete(purge_all_notes))
        .route(
            "/v1/notes/:project_id",
            get(get_notes).put(put_note).delete(purge_notes),
        )
}

async fn get_notes(
    State(state): State<AppStateArc>,
    Path(project_id): Path<String>,
) -> Result<Json<NotesResponse>, ApiError> {
    let project_id = require_project(&project_id)?;
    let store = state.engine.store().clone();
    let id = project_id.clone();
    let notes = blocking(move || store.get(&id)).await?;
    Ok(Json(NotesResponse { project_id, notes }))
}

async fn put_note(
    State(state): State<AppStateArc>,
    Path(project_id): Path<String>,
    payload: Result<Json<NoteWrite>, JsonRejection>,
) -> Result<Json<SessionNote>, ApiError> {
    let Json(write) = payload?;
    let project_id = require_project(&project_id)?;
    if write.key.trim().is_empty() {
        return Err(OceError::MalformedRequest("note key must not be blank".to_string()).into());
    }

    info!("  Storing note '{}' for {}", write.key.trim(), project_id);
    let store = state.engine.store().clone();
    let note = blocking(move || store.put(&project_id, &write.key, &write.value)).await?;
    Ok(Json(note))
}

async fn purge_notes(
    State(state): State<AppStateArc>,
    Path(project_id): Path<String>,
) -> Result<Json<PurgeResponse>, ApiError> {
    let project_id = require_project(&project_id)?;
    let store = state.engine.store().clone();
    let id = project_id.clone();
    let removed = blocking(move || store.purge(&id)).await?;
    info!("  Purged {} note record(s) for {}", removed, project_id);
    Ok(Json(PurgeResponse {
        project_id,
        removed,
    }))
}

async fn purge_all_notes(State(state): State<AppStateArc>) -> Result<StatusCode, ApiError> {
    let store = state.engine.store().clone();
    blocking(move || store.purge_all()).await?;
    info!("  Purged all session notes");
    Ok(StatusCode::NO_CONTENT)
}
