//! Tenant-scoped handlers. The tenant middleware has already attached a
//! [`TenantHandle`] by the time these run.

use axum::extract::Query;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use conductor_core::models::NewTask;
use conductor_core::traits::TenantHandle;
use conductor_core::ConductorError;

use crate::error::ApiResult;
use crate::response::{created, success};

pub async fn list_workers(
    Extension(handle): Extension<TenantHandle>,
) -> ApiResult<impl IntoResponse> {
    let workers = handle.workers.list().await?;
    Ok(success(workers))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

pub async fn recent_activity(
    Extension(handle): Extension<TenantHandle>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    let entries = handle.activity.recent(limit).await?;
    Ok(success(entries))
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub worker_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    5
}

pub async fn create_task(
    Extension(handle): Extension<TenantHandle>,
    Json(request): Json<CreateTaskRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.title.trim().is_empty() {
        return Err(ConductorError::validation("task title must not be empty").into());
    }

    // Tasks are pre-assigned; the assignee must exist up front.
    handle
        .workers
        .find_by_id(&request.worker_id)
        .await?
        .ok_or_else(|| ConductorError::WorkerNotFound {
            id: request.worker_id.clone(),
        })?;

    let task = handle
        .tasks
        .create(&NewTask {
            worker_id: request.worker_id,
            title: request.title,
            description: request.description,
            priority: request.priority,
        })
        .await?;
    Ok(created(task))
}
