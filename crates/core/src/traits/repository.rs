//! Persistence seams.
//!
//! The tenant repository works against the shared registry schema; task,
//! worker, message and activity repositories are always scoped to one
//! tenant's schema and reached through a [`TenantHandle`].
//!
//! Methods returning `bool` are conditional single-row updates: `true` means
//! the row transitioned, `false` means the guard no longer held (another
//! pass won the race, or the row moved on). Callers treat `false` as a clean
//! no-op, never as an error.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ConductorResult;
use crate::models::{
    ActivityEntry, Message, NewActivityEntry, NewMessage, NewTask, NewTenant, NewWorker, Task,
    TaskPatch, TaskStatus, Tenant, TenantStatus, Worker, WorkerStatus,
};

/// Registry-schema tenant store.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Inserts a tenant in `provisioning` status.
    async fn create(&self, tenant: &NewTenant) -> ConductorResult<Tenant>;

    async fn find_by_slug(&self, slug: &str) -> ConductorResult<Option<Tenant>>;

    /// Active tenants in creation order. Sweeps iterate this; suspended and
    /// provisioning tenants are skipped.
    async fn list_active(&self) -> ConductorResult<Vec<Tenant>>;

    async fn update_status(&self, id: Uuid, status: TenantStatus) -> ConductorResult<bool>;

    async fn rename(&self, slug: &str, display_name: &str) -> ConductorResult<bool>;

    /// Removes the tenant row. Schema teardown is the registry's job and
    /// happens before this is called.
    async fn delete(&self, slug: &str) -> ConductorResult<bool>;
}

/// Tenant-scoped task store.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Inserts a `pending` task pre-assigned to one worker.
    async fn create(&self, task: &NewTask) -> ConductorResult<Task>;

    async fn find_by_id(&self, id: Uuid) -> ConductorResult<Option<Task>>;

    /// Pending tasks ordered by priority ascending then age ascending.
    async fn list_assignable(&self, limit: i64) -> ConductorResult<Vec<Task>>;

    /// `in_progress` tasks started at or before `cutoff`.
    async fn list_stuck(&self, cutoff: DateTime<Utc>) -> ConductorResult<Vec<Task>>;

    /// `pending -> in_progress`, stamping `started_at`. Only succeeds while
    /// the task is still pending.
    async fn claim(&self, id: Uuid) -> ConductorResult<bool>;

    /// `in_progress -> pending`, clearing `started_at`. Compensation for a
    /// claim whose follow-up failed.
    async fn release(&self, id: Uuid) -> ConductorResult<bool>;

    /// `in_progress -> blocked`, recording the previous status and a reason.
    async fn block(&self, id: Uuid, reason: &str) -> ConductorResult<bool>;

    /// `in_progress -> completed|failed`. A task that already moved off
    /// `in_progress` is left untouched, which makes late completion
    /// callbacks no-ops.
    async fn finish(
        &self,
        id: Uuid,
        status: TaskStatus,
        error_detail: Option<&str>,
    ) -> ConductorResult<bool>;

    /// Applies only the fields present in the patch. Re-applying the same
    /// values is a no-op, so callers may retry freely.
    async fn apply_patch(&self, id: Uuid, patch: &TaskPatch) -> ConductorResult<bool>;

    /// Records that a durable workflow start was issued. Writes only when no
    /// workflow id is recorded yet, so a crashed-and-retried start never
    /// overwrites the first.
    async fn record_workflow_started(&self, id: Uuid, workflow_id: &str) -> ConductorResult<bool>;

    /// Whether any `in_progress` task references the worker.
    async fn has_in_progress_for_worker(&self, worker_id: &str) -> ConductorResult<bool>;

    /// Whether the worker has a pending or in-progress task with this title.
    async fn has_open_task_titled(&self, worker_id: &str, title: &str) -> ConductorResult<bool>;

    /// Deletes terminal tasks older than `cutoff`. Returns rows removed.
    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> ConductorResult<u64>;
}

/// Tenant-scoped worker store.
#[async_trait]
pub trait WorkerRepository: Send + Sync {
    /// Inserts an `idle` worker with no current task.
    async fn create(&self, worker: &NewWorker) -> ConductorResult<Worker>;

    async fn find_by_id(&self, id: &str) -> ConductorResult<Option<Worker>>;

    async fn list(&self) -> ConductorResult<Vec<Worker>>;

    async fn list_idle(&self) -> ConductorResult<Vec<Worker>>;

    async fn list_working(&self) -> ConductorResult<Vec<Worker>>;

    /// Plain status write, used by workflow callbacks. Re-applying the same
    /// status is a no-op by construction.
    async fn set_status(&self, id: &str, status: WorkerStatus) -> ConductorResult<bool>;

    /// `idle -> working`, setting `current_task_id`. Only succeeds while the
    /// worker is still idle.
    async fn engage(&self, id: &str, task_id: Uuid) -> ConductorResult<bool>;

    /// `working -> idle`, but only if the worker still points at exactly
    /// `task_id`. A worker that has since picked up different work is left
    /// alone.
    async fn release(&self, id: &str, task_id: Uuid) -> ConductorResult<bool>;

    /// `working -> idle` unconditionally on the task reference. Used by the
    /// auditor once it has established no in-progress task backs the worker.
    async fn force_idle(&self, id: &str) -> ConductorResult<bool>;
}

/// Tenant-scoped message store.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: &NewMessage) -> ConductorResult<Message>;

    async fn unread_for(&self, recipient_id: &str) -> ConductorResult<Vec<Message>>;

    async fn count_unread(&self, recipient_id: &str) -> ConductorResult<i64>;

    async fn mark_read(&self, ids: &[Uuid]) -> ConductorResult<u64>;

    /// Deletes read messages older than `cutoff`. Returns rows removed.
    async fn delete_read_before(&self, cutoff: DateTime<Utc>) -> ConductorResult<u64>;
}

/// Tenant-scoped audit log.
#[async_trait]
pub trait ActivityLogRepository: Send + Sync {
    async fn record(&self, entry: &NewActivityEntry) -> ConductorResult<ActivityEntry>;

    async fn recent(&self, limit: i64) -> ConductorResult<Vec<ActivityEntry>>;

    /// Deletes entries older than `cutoff`. Returns rows removed.
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> ConductorResult<u64>;
}

/// A live accessor for one tenant's schema: the tenant record plus the four
/// scoped repositories. Cheap to clone, expensive to construct, cached by
/// the [`TenantHandleProvider`].
#[derive(Clone)]
pub struct TenantHandle {
    pub tenant: Tenant,
    pub tasks: Arc<dyn TaskRepository>,
    pub workers: Arc<dyn WorkerRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub activity: Arc<dyn ActivityLogRepository>,
}

impl std::fmt::Debug for TenantHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantHandle")
            .field("tenant", &self.tenant.slug)
            .finish()
    }
}

/// Factory and cache for tenant handles.
#[async_trait]
pub trait TenantHandleProvider: Send + Sync {
    /// Returns a handle for the slug, building and caching one if needed.
    /// Fails fast for unknown or inactive tenants; an inactive tenant never
    /// acquires a live handle.
    async fn handle(&self, slug: &str) -> ConductorResult<TenantHandle>;

    /// Drops a cached handle. Must run before the tenant's schema is torn
    /// down so no live handle outlives its namespace.
    async fn evict(&self, slug: &str);

    /// Drains every cached handle for shutdown.
    async fn disconnect_all(&self);

    /// Slugs currently cached, for diagnostics.
    async fn cached_slugs(&self) -> Vec<String>;
}
