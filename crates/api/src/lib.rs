//! HTTP surface: tenant administration, job control and tenant-scoped data
//! access, with tenant resolution handled in middleware.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use middleware::{AuthClaims, TenantContext, TenantSource, TENANT_HEADER};
pub use response::ApiResponse;
pub use routes::{create_routes, AppState};
