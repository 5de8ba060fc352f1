use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use conductor_core::config::ApiConfig;
use conductor_core::traits::{JobControl, TenantHandleProvider, TenantLifecycle};

use crate::handlers::{
    health::health_check,
    jobs::{list_jobs, pause_job, resume_job, trigger_job},
    org::{create_task, list_workers, recent_activity},
    tenants::{create_tenant, delete_tenant, get_tenant, list_tenants, rename_tenant},
};
use crate::middleware::{cors_layer, optional_tenant, require_tenant, trace_layer};

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobControl>,
    pub lifecycle: Arc<dyn TenantLifecycle>,
    pub handles: Arc<dyn TenantHandleProvider>,
    pub config: ApiConfig,
}

pub fn create_routes(state: AppState) -> Router {
    // Routes under /api/org see one tenant's data; the middleware resolves
    // which one and attaches the handle.
    let org_routes = Router::new()
        .route("/api/org/workers", get(list_workers))
        .route("/api/org/activity", get(recent_activity))
        .route("/api/org/tasks", post(create_task))
        .route_layer(from_fn_with_state(state.clone(), require_tenant));

    // Admin routes work without a tenant, but pick up the context when the
    // request carries one, so audit lines can attribute the caller.
    let admin_routes = Router::new()
        .route("/api/tenants", get(list_tenants).post(create_tenant))
        .route(
            "/api/tenants/{slug}",
            get(get_tenant).patch(rename_tenant).delete(delete_tenant),
        )
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/{name}/trigger", post(trigger_job))
        .route("/api/jobs/{name}/pause", post(pause_job))
        .route("/api/jobs/{name}/resume", post(resume_job))
        .route_layer(from_fn_with_state(state.clone(), optional_tenant));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .merge(admin_routes)
        .merge(org_routes)
        .layer(trace_layer());

    if state.config.cors_enabled {
        router = router.layer(cors_layer());
    }

    router.with_state(state)
}
