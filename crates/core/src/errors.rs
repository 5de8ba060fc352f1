use thiserror::Error;

/// Error taxonomy shared by every component.
///
/// Request handlers surface these as typed HTTP errors; the periodic sweeps
/// log and continue instead of propagating to a caller.
#[derive(Debug, Error)]
pub enum ConductorError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("tenant not found: {slug}")]
    TenantNotFound { slug: String },

    #[error("tenant not active: {slug} (status: {status})")]
    TenantInactive { slug: String, status: String },

    #[error("job not found: {name}")]
    JobNotFound { name: String },

    #[error("task not found: {id}")]
    TaskNotFound { id: uuid::Uuid },

    #[error("worker not found: {id}")]
    WorkerNotFound { id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid state: {0}")]
    State(String),

    #[error("infrastructure failure: {0}")]
    Infrastructure(String),

    #[error("invalid cron expression: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Unified result type.
pub type ConductorResult<T> = std::result::Result<T, ConductorError>;

impl ConductorError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    pub fn tenant_not_found<S: Into<String>>(slug: S) -> Self {
        Self::TenantNotFound { slug: slug.into() }
    }

    pub fn tenant_inactive<S: Into<String>>(slug: S, status: S) -> Self {
        Self::TenantInactive {
            slug: slug.into(),
            status: status.into(),
        }
    }

    pub fn job_not_found<S: Into<String>>(name: S) -> Self {
        Self::JobNotFound { name: name.into() }
    }

    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn state<S: Into<String>>(msg: S) -> Self {
        Self::State(msg.into())
    }

    pub fn infrastructure<S: Into<String>>(msg: S) -> Self {
        Self::Infrastructure(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a retry of the same operation could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConductorError::Database(_) | ConductorError::Infrastructure(_)
        )
    }
}

impl From<serde_json::Error> for ConductorError {
    fn from(err: serde_json::Error) -> Self {
        ConductorError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for ConductorError {
    fn from(err: anyhow::Error) -> Self {
        ConductorError::Internal(err.to_string())
    }
}
