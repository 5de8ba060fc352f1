use axum::extract::{Path, State};
use axum::response::IntoResponse;

use crate::error::ApiResult;
use crate::response::{success, ApiResponse};
use crate::routes::AppState;

pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    success(state.jobs.list_jobs().await)
}

pub async fn trigger_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.jobs.trigger(&name).await?;
    Ok(ApiResponse::success_empty_with_message(format!(
        "job {name} triggered"
    )))
}

pub async fn pause_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.jobs.pause(&name).await?;
    Ok(ApiResponse::success_empty_with_message(format!(
        "job {name} paused"
    )))
}

pub async fn resume_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.jobs.resume(&name).await?;
    Ok(ApiResponse::success_empty_with_message(format!(
        "job {name} resumed"
    )))
}
