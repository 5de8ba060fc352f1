use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use conductor_core::errors::ConductorResult;
use conductor_core::events::{EventBus, SystemEvent};
use conductor_core::models::WorkerStatus;
use conductor_core::traits::{TenantHandle, TenantHandleProvider, TenantRepository};

/// Moves tasks that have sat `in_progress` past the timeout to `blocked` and
/// frees their workers. The worker release is guarded on the worker still
/// pointing at the stuck task; a worker that moved on keeps its current
/// assignment.
pub struct StuckTaskReaper {
    tenants: Arc<dyn TenantRepository>,
    handles: Arc<dyn TenantHandleProvider>,
    events: Arc<dyn EventBus>,
    timeout_minutes: i64,
}

impl StuckTaskReaper {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        handles: Arc<dyn TenantHandleProvider>,
        events: Arc<dyn EventBus>,
        timeout_minutes: i64,
    ) -> Self {
        Self {
            tenants,
            handles,
            events,
            timeout_minutes,
        }
    }

    /// Runs one pass over a single tenant. Returns how many tasks were
    /// blocked.
    pub async fn reap_tenant(&self, handle: &TenantHandle) -> ConductorResult<usize> {
        let slug = handle.tenant.slug.as_str();
        let cutoff = Utc::now() - Duration::minutes(self.timeout_minutes);
        let stuck = handle.tasks.list_stuck(cutoff).await?;
        let mut blocked = 0;

        for task in stuck {
            let reason = format!(
                "no progress for over {} minutes, blocked by reaper",
                self.timeout_minutes
            );
            if !handle.tasks.block(task.id, &reason).await? {
                // Finished between the listing and the block.
                continue;
            }
            blocked += 1;

            let released = handle.workers.release(&task.worker_id, task.id).await?;
            info!(
                tenant = slug,
                task_id = %task.id,
                worker_id = %task.worker_id,
                worker_released = released,
                "blocked stuck task"
            );

            self.events.publish(SystemEvent::TaskFailed {
                tenant: slug.to_string(),
                task_id: task.id,
                reason,
            });
            if released {
                self.events.publish(SystemEvent::WorkerStatusChanged {
                    tenant: slug.to_string(),
                    worker_id: task.worker_id.clone(),
                    from: WorkerStatus::Working,
                    to: WorkerStatus::Idle,
                });
            }
        }

        Ok(blocked)
    }
}

#[async_trait]
impl crate::job_scheduler::JobHandler for StuckTaskReaper {
    async fn run(&self) -> ConductorResult<()> {
        for tenant in self.tenants.list_active().await? {
            let handle = match self.handles.handle(&tenant.slug).await {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(tenant = %tenant.slug, error = %e, "skipping tenant, no handle");
                    continue;
                }
            };
            if let Err(e) = self.reap_tenant(&handle).await {
                warn!(tenant = %tenant.slug, error = %e, "reaper failed for tenant");
            }
        }
        Ok(())
    }
}
