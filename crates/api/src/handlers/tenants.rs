use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use conductor_core::ConductorError;

use crate::error::ApiResult;
use crate::response::{created, no_content, success};
use crate::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameTenantRequest {
    pub display_name: String,
}

pub async fn create_tenant(
    State(state): State<AppState>,
    Json(request): Json<CreateTenantRequest>,
) -> ApiResult<impl IntoResponse> {
    let tenant = state.lifecycle.create_tenant(&request.display_name).await?;
    Ok(created(tenant))
}

pub async fn list_tenants(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let tenants = state.lifecycle.list_tenants().await?;
    Ok(success(tenants))
}

pub async fn get_tenant(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let tenant = state
        .lifecycle
        .list_tenants()
        .await?
        .into_iter()
        .find(|t| t.slug == slug)
        .ok_or_else(|| ConductorError::tenant_not_found(slug))?;
    Ok(success(tenant))
}

pub async fn rename_tenant(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<RenameTenantRequest>,
) -> ApiResult<impl IntoResponse> {
    let tenant = state
        .lifecycle
        .rename_tenant(&slug, &request.display_name)
        .await?;
    Ok(success(tenant))
}

pub async fn delete_tenant(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.lifecycle.delete_tenant(&slug).await?;
    Ok(no_content())
}
