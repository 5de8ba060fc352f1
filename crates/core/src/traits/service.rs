//! Service seams consumed by the HTTP layer. Keeping these in the core crate
//! lets the API crate depend on abstractions instead of the scheduler and
//! registry implementations.

use async_trait::async_trait;

use crate::errors::ConductorResult;
use crate::models::{JobStatus, Tenant};

/// Introspection and control surface over the recurring job scheduler.
#[async_trait]
pub trait JobControl: Send + Sync {
    async fn list_jobs(&self) -> Vec<JobStatus>;

    /// Runs the job immediately, outside its schedule.
    async fn trigger(&self, name: &str) -> ConductorResult<()>;

    async fn pause(&self, name: &str) -> ConductorResult<()>;

    async fn resume(&self, name: &str) -> ConductorResult<()>;
}

/// Tenant lifecycle operations with provisioning and rollback handled
/// behind the seam.
#[async_trait]
pub trait TenantLifecycle: Send + Sync {
    /// Creates a tenant end to end: slug derivation, schema provisioning,
    /// seeding. On any failure the partial state is already rolled back when
    /// the error surfaces.
    async fn create_tenant(&self, display_name: &str) -> ConductorResult<Tenant>;

    async fn list_tenants(&self) -> ConductorResult<Vec<Tenant>>;

    async fn rename_tenant(&self, slug: &str, display_name: &str) -> ConductorResult<Tenant>;

    /// Refuses while any worker in the tenant is `working`, naming the
    /// offenders in the error.
    async fn delete_tenant(&self, slug: &str) -> ConductorResult<()>;
}
