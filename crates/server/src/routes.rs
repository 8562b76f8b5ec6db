use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::backend::VoteBackend;
use crate::error::VoteError;
use crate::models::{NewPoll, Poll, VoteRequest, VoteResponse, VoteResult, VoteStatus};

// ===== App State =====

pub struct AppState<B> {
    pub backend: Arc<B>,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

// ===== Router =====

pub fn router<B: VoteBackend>(backend: Arc<B>) -> Router {
    let state = AppState { backend };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health::<B>))
        .route("/api/vote", post(submit_vote::<B>))
        .route("/api/polls", post(create_poll::<B>).get(list_polls::<B>))
        .route("/api/polls/:poll_id", get(get_poll::<B>))
        .route("/api/polls/:poll_id/results", get(get_results::<B>))
        .route("/api/polls/:poll_id/votes/:user_id", get(get_vote::<B>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ===== Handlers =====

async fn root() -> &'static str {
    "Poll voting backend - POST /api/vote, see /health for status"
}

async fn health<B: VoteBackend>(State(state): State<AppState<B>>) -> impl IntoResponse {
    let backend = state.backend.backend_name();
    match state.backend.health().await {
        Ok(()) => Json(serde_json::json!({
            "status": "ok",
            "backend": backend,
        })),
        Err(err) => {
            tracing::warn!("health check failed: {err}");
            Json(serde_json::json!({
                "status": "error",
                "backend": backend,
            }))
        }
    }
}

async fn submit_vote<B: VoteBackend>(
    State(state): State<AppState<B>>,
    Json(vote): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, AppError> {
    let outcome = state.backend.submit_vote(&vote).await?;
    Ok(Json(outcome.into()))
}

async fn create_poll<B: VoteBackend>(
    State(state): State<AppState<B>>,
    Json(new_poll): Json<NewPoll>,
) -> Result<(StatusCode, Json<Poll>), AppError> {
    let poll = state.backend.add_poll(new_poll).await?;
    Ok((StatusCode::CREATED, Json(poll)))
}

async fn list_polls<B: VoteBackend>(
    State(state): State<AppState<B>>,
) -> Result<Json<Vec<Poll>>, AppError> {
    Ok(Json(state.backend.fetch_polls().await?))
}

async fn get_poll<B: VoteBackend>(
    State(state): State<AppState<B>>,
    Path(poll_id): Path<String>,
) -> Result<Json<Poll>, AppError> {
    Ok(Json(state.backend.fetch_poll(&poll_id).await?))
}

async fn get_results<B: VoteBackend>(
    State(state): State<AppState<B>>,
    Path(poll_id): Path<String>,
) -> Result<Json<VoteResult>, AppError> {
    Ok(Json(state.backend.fetch_results(&poll_id).await?))
}

async fn get_vote<B: VoteBackend>(
    State(state): State<AppState<B>>,
    Path((poll_id, user_id)): Path<(String, String)>,
) -> Result<Json<VoteStatus>, AppError> {
    let record = state.backend.fetch_vote(&poll_id, &user_id).await?;
    Ok(Json(record.into()))
}

// ===== Error Handling =====

pub struct AppError(VoteError);

impl From<VoteError> for AppError {
    fn from(err: VoteError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            VoteError::PollNotFound(_) => StatusCode::NOT_FOUND,
            VoteError::InvalidOption { .. } | VoteError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            VoteError::PollExists(_) => StatusCode::CONFLICT,
            VoteError::InconsistentState(_) | VoteError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if self.0.is_client_error() {
            self.0.to_string()
        } else {
            tracing::error!("request failed: {:?}", self.0);
            "Internal server error".to_string()
        };

        let body = VoteResponse {
            success: false,
            message,
        };
        (status, Json(body)).into_response()
    }
}
