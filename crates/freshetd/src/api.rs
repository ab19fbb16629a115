//! REST gateway in front of the scheduler.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/jobs` | Submit a model run |
//! | GET | `/api/v1/jobs/{id}` | Job status |
//! | DELETE | `/api/v1/jobs/{id}` | Cancel a job |
//! | GET | `/api/v1/nodes` | Node inventory with availability |

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tracing::info;

use freshet_registry::ResourceRegistry;
use freshet_scheduler::{Scheduler, SchedulerError, SubmitRequest, SubmitResponse};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<Scheduler>,
    pub registry: Arc<ResourceRegistry>,
}

/// Response wrapper for the read endpoints.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// POST /api/v1/jobs
async fn submit_job(
    State(state): State<ApiState>,
    Json(request): Json<SubmitRequest>,
) -> impl IntoResponse {
    info!(cpus = request.cpu_count, "submission received");
    if request.session_secret.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(SubmitResponse::denied(
                "invalid request",
                "session_secret must not be empty",
            )),
        )
            .into_response();
    }
    match state.scheduler.submit(request.into_model_request()).await {
        Ok(job_id) => Json(SubmitResponse::accepted(job_id)).into_response(),
        Err(SchedulerError::InvalidRequest(msg)) => (
            StatusCode::BAD_REQUEST,
            Json(SubmitResponse::denied("invalid request", msg)),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SubmitResponse::denied("internal error", e.to_string())),
        )
            .into_response(),
    }
}

/// GET /api/v1/jobs/{id}
async fn get_job(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.scheduler.status(&id) {
        Ok(status) => ApiResponse::ok(status).into_response(),
        Err(SchedulerError::JobNotFound(_)) => {
            error_response("job not found", StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => {
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

/// DELETE /api/v1/jobs/{id}
async fn cancel_job(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.scheduler.cancel(&id).await {
        Ok(()) => ApiResponse::ok("cancellation requested").into_response(),
        Err(SchedulerError::JobNotFound(_)) => {
            error_response("job not found", StatusCode::NOT_FOUND).into_response()
        }
        Err(e) => {
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

/// GET /api/v1/nodes
async fn list_nodes(State(state): State<ApiState>) -> impl IntoResponse {
    match state.registry.snapshot().await {
        Ok(nodes) => ApiResponse::ok(nodes).into_response(),
        Err(e) => {
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

/// Build the complete API router.
pub fn build_router(scheduler: Arc<Scheduler>, registry: Arc<ResourceRegistry>) -> Router {
    let state = ApiState {
        scheduler,
        registry,
    };

    let api_routes = Router::new()
        .route("/jobs", axum::routing::post(submit_job))
        .route("/jobs/{id}", get(get_job).delete(cancel_job))
        .route("/nodes", get(list_nodes))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
