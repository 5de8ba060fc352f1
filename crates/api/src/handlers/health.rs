use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::routes::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let cached_tenants = state.handles.cached_slugs().await.len();
    Json(json!({
        "status": "ok",
        "service": "conductor",
        "version": env!("CARGO_PKG_VERSION"),
        "cached_tenants": cached_tenants,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
