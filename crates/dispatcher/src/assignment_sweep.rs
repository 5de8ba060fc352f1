use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use conductor_core::errors::ConductorResult;
use conductor_core::events::{EventBus, SystemEvent};
use conductor_core::models::{Task, WorkerStatus};
use conductor_core::traits::{
    TenantHandle, TenantHandleProvider, TenantRepository, WorkflowInput, WorkflowRunner,
};

use crate::job_scheduler::JobHandler;

/// Starts work on pending tasks.
///
/// Tasks arrive pre-assigned to a worker; the sweep's job is to move each
/// pair through `pending -> in_progress` / `idle -> working` and hand the
/// task to the workflow engine. Every step is a conditional update and every
/// failure unwinds the steps already taken, so concurrent sweeps over the
/// same tenant settle on exactly one owner per task.
pub struct AssignmentSweep {
    tenants: Arc<dyn TenantRepository>,
    handles: Arc<dyn TenantHandleProvider>,
    runner: Arc<dyn WorkflowRunner>,
    events: Arc<dyn EventBus>,
}

impl AssignmentSweep {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        handles: Arc<dyn TenantHandleProvider>,
        runner: Arc<dyn WorkflowRunner>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            tenants,
            handles,
            runner,
            events,
        }
    }

    /// Runs one pass over a single tenant. Returns how many tasks were
    /// started.
    pub async fn sweep_tenant(&self, handle: &TenantHandle) -> ConductorResult<usize> {
        let slug = handle.tenant.slug.as_str();

        let idle = handle.workers.list_idle().await?;
        if idle.is_empty() {
            debug!(tenant = slug, "no idle workers, skipping");
            return Ok(0);
        }

        // Never pull more tasks than there are idle workers to take them.
        let candidates = handle.tasks.list_assignable(idle.len() as i64).await?;
        let mut started = 0;

        for task in candidates {
            if self.start_task(handle, &task).await? {
                started += 1;
            }
        }

        if started > 0 {
            info!(tenant = slug, started, "assignment sweep started tasks");
        }
        Ok(started)
    }

    async fn start_task(&self, handle: &TenantHandle, task: &Task) -> ConductorResult<bool> {
        let slug = handle.tenant.slug.as_str();

        if !handle.tasks.claim(task.id).await? {
            // Another sweep got here first.
            debug!(tenant = slug, task_id = %task.id, "task no longer pending");
            return Ok(false);
        }

        if !handle.workers.engage(&task.worker_id, task.id).await? {
            // Assignee is not idle after all; put the task back.
            handle.tasks.release(task.id).await?;
            debug!(
                tenant = slug,
                task_id = %task.id,
                worker_id = %task.worker_id,
                "assigned worker not idle, released task"
            );
            return Ok(false);
        }

        let input = WorkflowInput {
            task_id: task.id,
            worker_id: task.worker_id.clone(),
            tenant_slug: slug.to_string(),
            prompt_materials: json!({
                "title": task.title,
                "description": task.description,
                "priority": task.priority,
            }),
        };

        match self.runner.start(input).await {
            Ok(workflow_id) => {
                handle
                    .tasks
                    .record_workflow_started(task.id, &workflow_id)
                    .await?;
                self.events.publish(SystemEvent::WorkerStatusChanged {
                    tenant: slug.to_string(),
                    worker_id: task.worker_id.clone(),
                    from: WorkerStatus::Idle,
                    to: WorkerStatus::Working,
                });
                info!(
                    tenant = slug,
                    task_id = %task.id,
                    worker_id = %task.worker_id,
                    workflow_id = %workflow_id,
                    "task started"
                );
                Ok(true)
            }
            Err(e) => {
                // Unwind both claims so the next sweep retries cleanly.
                handle.workers.release(&task.worker_id, task.id).await?;
                handle.tasks.release(task.id).await?;
                warn!(
                    tenant = slug,
                    task_id = %task.id,
                    error = %e,
                    "workflow start failed, task released"
                );
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl JobHandler for AssignmentSweep {
    async fn run(&self) -> ConductorResult<()> {
        for tenant in self.tenants.list_active().await? {
            let handle = match self.handles.handle(&tenant.slug).await {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(tenant = %tenant.slug, error = %e, "skipping tenant, no handle");
                    continue;
                }
            };
            if let Err(e) = self.sweep_tenant(&handle).await {
                warn!(tenant = %tenant.slug, error = %e, "assignment sweep failed for tenant");
            }
        }
        Ok(())
    }
}
