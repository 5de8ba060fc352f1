use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use conductor_core::ConductorError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] ConductorError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("tenant could not be resolved from the request")]
    TenantUnresolved,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::Core(core) => {
                let (status, error_type) = match core {
                    ConductorError::TenantNotFound { .. } => {
                        (StatusCode::NOT_FOUND, "TENANT_NOT_FOUND")
                    }
                    ConductorError::TaskNotFound { .. } => {
                        (StatusCode::NOT_FOUND, "TASK_NOT_FOUND")
                    }
                    ConductorError::WorkerNotFound { .. } => {
                        (StatusCode::NOT_FOUND, "WORKER_NOT_FOUND")
                    }
                    ConductorError::JobNotFound { .. } => (StatusCode::NOT_FOUND, "JOB_NOT_FOUND"),
                    ConductorError::TenantInactive { .. } => {
                        (StatusCode::FORBIDDEN, "TENANT_INACTIVE")
                    }
                    ConductorError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                    ConductorError::InvalidCron { .. } => {
                        (StatusCode::BAD_REQUEST, "INVALID_CRON_EXPRESSION")
                    }
                    ConductorError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                    ConductorError::State(_) => (StatusCode::CONFLICT, "INVALID_STATE"),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
                };
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    // Internals stay in the logs, not the response.
                    tracing::error!(error = %core, "internal error in request handler");
                    "internal server error".to_string()
                } else {
                    core.to_string()
                };
                (status, error_type, message)
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::TenantUnresolved => (
                StatusCode::BAD_REQUEST,
                "TENANT_UNRESOLVED",
                self.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}
