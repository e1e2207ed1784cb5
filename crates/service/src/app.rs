use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use finrag_rag::{LoadSummary, Pipeline, ReportRequest};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info};

pub struct AppState {
    pipeline: Pipeline,
    /// Held exclusively by loads and shared by reports.
    collection: RwLock<()>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            collection: RwLock::new(()),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/load", post(handle_load))
        .route("/report", post(handle_report))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn handle_load(State(state): State<Arc<AppState>>) -> Result<Json<LoadSummary>, AppError> {
    let _exclusive = state.collection.write().await;
    info!("load requested");
    let summary = state.pipeline.load().await.map_err(AppError::internal)?;
    Ok(Json(summary))
}

async fn handle_report(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReportRequest>,
) -> Result<Json<Value>, AppError> {
    if body.prompt.trim().is_empty() {
        return Err(AppError::bad_request("prompt must not be empty"));
    }
    let _shared = state.collection.read().await;
    let answer = state
        .pipeline
        .report(&body)
        .await
        .map_err(AppError::internal)?;
    info!(hits = answer.hits.len(), query = %answer.retrieval_query, "report answered");
    Ok(Json(answer.answer))
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn bad_request<E: ToString>(msg: E) -> Self {
        Self::BadRequest(msg.to_string())
    }

    fn internal<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Internal(err) => {
                error!(error = %format!("{err:#}"), "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}
