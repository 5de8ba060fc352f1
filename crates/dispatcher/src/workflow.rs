use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use conductor_core::errors::{ConductorError, ConductorResult};
use conductor_core::events::{EventBus, SystemEvent};
use conductor_core::models::{Message, NewActivityEntry, TaskPatch, TaskStatus, WorkerStatus};
use conductor_core::traits::{TenantHandleProvider, WorkflowInput, WorkflowRunner};
use uuid::Uuid;

/// Runner used when no external durable engine is configured. Starts are
/// acknowledged with a generated id so the assignment flow still records
/// ownership; execution is driven entirely through the callback surface.
#[derive(Debug, Default)]
pub struct LocalWorkflowRunner;

#[async_trait]
impl WorkflowRunner for LocalWorkflowRunner {
    async fn start(&self, input: WorkflowInput) -> ConductorResult<String> {
        let workflow_id = format!("wf-{}", Uuid::new_v4());
        info!(
            workflow_id = %workflow_id,
            tenant = %input.tenant_slug,
            task_id = %input.task_id,
            worker_id = %input.worker_id,
            "workflow start accepted"
        );
        Ok(workflow_id)
    }
}

/// The narrow surface the durable workflow engine calls back into.
///
/// Workflows never touch repositories directly; everything funnels through
/// these methods, each safe to retry: the underlying writes are conditional
/// updates, so a replayed callback that already landed is a no-op.
pub struct WorkflowCallbacks {
    handles: Arc<dyn TenantHandleProvider>,
    events: Arc<dyn EventBus>,
}

impl WorkflowCallbacks {
    pub fn new(handles: Arc<dyn TenantHandleProvider>, events: Arc<dyn EventBus>) -> Self {
        Self { handles, events }
    }

    /// Applies a partial task update. Returns `false` when the task no
    /// longer exists.
    pub async fn update_task_status(
        &self,
        tenant_slug: &str,
        task_id: Uuid,
        patch: TaskPatch,
    ) -> ConductorResult<bool> {
        if patch.is_empty() {
            return Err(ConductorError::validation("empty task patch"));
        }
        let handle = self.handles.handle(tenant_slug).await?;
        handle.tasks.apply_patch(task_id, &patch).await
    }

    /// Moves a task to a terminal status, frees its worker and announces the
    /// outcome. A callback arriving after the task already left
    /// `in_progress` (reaped, cancelled) changes nothing and returns
    /// `false`.
    pub async fn complete_task(
        &self,
        tenant_slug: &str,
        task_id: Uuid,
        status: TaskStatus,
        error_detail: Option<&str>,
    ) -> ConductorResult<bool> {
        if !status.is_terminal() {
            return Err(ConductorError::validation(format!(
                "completion status must be terminal, got {status}"
            )));
        }

        let handle = self.handles.handle(tenant_slug).await?;
        let task = handle
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or(ConductorError::TaskNotFound { id: task_id })?;

        if !handle.tasks.finish(task_id, status, error_detail).await? {
            debug!(tenant = tenant_slug, task_id = %task_id, "late completion, ignoring");
            return Ok(false);
        }

        // Guarded on the worker still holding this task.
        let released = handle.workers.release(&task.worker_id, task_id).await?;
        if released {
            self.events.publish(SystemEvent::WorkerStatusChanged {
                tenant: tenant_slug.to_string(),
                worker_id: task.worker_id.clone(),
                from: WorkerStatus::Working,
                to: WorkerStatus::Idle,
            });
        }

        info!(
            tenant = tenant_slug,
            task_id = %task_id,
            worker_id = %task.worker_id,
            %status,
            "task finished"
        );

        self.events.publish(SystemEvent::TaskCompleted {
            tenant: tenant_slug.to_string(),
            task_id,
            status,
        });
        if status == TaskStatus::Failed {
            self.events.publish(SystemEvent::TaskFailed {
                tenant: tenant_slug.to_string(),
                task_id,
                reason: error_detail.unwrap_or("unknown failure").to_string(),
            });
        }

        Ok(true)
    }

    /// Plain worker status write, with a change event when the status
    /// actually moved.
    pub async fn update_worker_status(
        &self,
        tenant_slug: &str,
        worker_id: &str,
        status: WorkerStatus,
    ) -> ConductorResult<bool> {
        let handle = self.handles.handle(tenant_slug).await?;
        let worker = handle
            .workers
            .find_by_id(worker_id)
            .await?
            .ok_or_else(|| ConductorError::WorkerNotFound {
                id: worker_id.to_string(),
            })?;

        if worker.status == status {
            return Ok(false);
        }
        if !handle.workers.set_status(worker_id, status).await? {
            return Ok(false);
        }

        self.events.publish(SystemEvent::WorkerStatusChanged {
            tenant: tenant_slug.to_string(),
            worker_id: worker_id.to_string(),
            from: worker.status,
            to: status,
        });
        Ok(true)
    }

    /// Progress is event-only; nothing is persisted.
    pub async fn emit_progress(
        &self,
        tenant_slug: &str,
        task_id: Uuid,
        percent: u8,
        note: Option<String>,
    ) -> ConductorResult<()> {
        self.events.publish(SystemEvent::TaskProgress {
            tenant: tenant_slug.to_string(),
            task_id,
            percent: percent.min(100),
            note,
        });
        Ok(())
    }

    /// Returns the worker's unread messages and marks them read, so a
    /// workflow processes each message once.
    pub async fn fetch_unread_messages(
        &self,
        tenant_slug: &str,
        worker_id: &str,
    ) -> ConductorResult<Vec<Message>> {
        let handle = self.handles.handle(tenant_slug).await?;
        let messages = handle.messages.unread_for(worker_id).await?;
        if !messages.is_empty() {
            let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
            handle.messages.mark_read(&ids).await?;
        }
        Ok(messages)
    }

    pub async fn log_activity(
        &self,
        tenant_slug: &str,
        actor: &str,
        action: &str,
        detail: Option<serde_json::Value>,
    ) -> ConductorResult<()> {
        let handle = self.handles.handle(tenant_slug).await?;
        handle
            .activity
            .record(&NewActivityEntry {
                actor: actor.to_string(),
                action: action.to_string(),
                detail,
            })
            .await?;
        Ok(())
    }
}
