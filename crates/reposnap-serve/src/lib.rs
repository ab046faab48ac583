use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use reposnap_conductor::{poll_status, StartError, WorkflowRegistry};
use reposnap_core::{CloneRequest, CloneStatus, ErrorClass, WorkflowId};

// ── Config ──

pub struct ServeConfig {
    pub bind: String,
    pub port: u16,
    /// How long a status poll lets the result settle before describing.
    pub result_wait: Duration,
}

// ── App State ──

struct AppState {
    registry: Arc<WorkflowRegistry>,
    result_wait: Duration,
}

// ── Error Handling ──

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

struct AppError {
    status: StatusCode,
    body: ErrorBody,
}

impl AppError {
    fn bad_request(error: impl ToString) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                message: "invalid request".into(),
                error: Some(error.to_string()),
            },
        }
    }

    fn plain(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: ErrorBody {
                message: message.into(),
                error: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<StartError> for AppError {
    fn from(err: StartError) -> Self {
        match err {
            StartError::Invalid(e) => AppError::bad_request(e),
            e if e.is_unavailable() => {
                AppError::plain(StatusCode::SERVICE_UNAVAILABLE, ErrorClass::ServiceUnavailable.message())
            }
            _ => AppError::plain(StatusCode::INTERNAL_SERVER_ERROR, "failed to start workflow"),
        }
    }
}

fn status_code(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::InvalidRef => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorClass::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorClass::WorkflowFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ── Entrypoint ──

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    registry: Arc<WorkflowRegistry>,
    config: ServeConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = router(registry, config.result_wait);
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "reposnap HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the router (for testing without binding to a port).
pub fn router(registry: Arc<WorkflowRegistry>, result_wait: Duration) -> Router {
    let state = Arc::new(AppState {
        registry,
        result_wait,
    });
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/repos/clone", post(post_clone))
        .route("/v1/repos/clone/{id}", get(get_clone))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

// ── POST /v1/repos/clone ──

async fn post_clone(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CloneRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CloneStatus>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    let workflow_id = state.registry.start(request).await?;
    Ok((StatusCode::CREATED, Json(CloneStatus::Started { workflow_id })))
}

// ── GET /v1/repos/clone/{id} ──

async fn get_clone(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CloneStatus>), AppError> {
    let id = WorkflowId::parse(&id).map_err(AppError::bad_request)?;
    let handle = state.registry.get_handle(id);
    let status = poll_status(&handle, state.result_wait).await;
    let code = status.error_class().map_or(StatusCode::OK, status_code);
    Ok((code, Json(status)))
}
