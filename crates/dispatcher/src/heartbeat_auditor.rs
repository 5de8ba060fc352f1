use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use conductor_core::errors::ConductorResult;
use conductor_core::events::{EventBus, SystemEvent};
use conductor_core::models::WorkerStatus;
use conductor_core::traits::{TenantHandle, TenantHandleProvider, TenantRepository};

/// Restores the worker-status invariant: a `working` worker must be backed
/// by an `in_progress` task. Workers whose task finished or was reaped
/// without the worker transition landing are forced back to `idle`.
pub struct HeartbeatAuditor {
    tenants: Arc<dyn TenantRepository>,
    handles: Arc<dyn TenantHandleProvider>,
    events: Arc<dyn EventBus>,
}

impl HeartbeatAuditor {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        handles: Arc<dyn TenantHandleProvider>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            tenants,
            handles,
            events,
        }
    }

    /// Runs one pass over a single tenant. Returns how many workers were
    /// reset.
    pub async fn audit_tenant(&self, handle: &TenantHandle) -> ConductorResult<usize> {
        let slug = handle.tenant.slug.as_str();
        let mut reset = 0;

        for worker in handle.workers.list_working().await? {
            if handle.tasks.has_in_progress_for_worker(&worker.id).await? {
                continue;
            }
            if !handle.workers.force_idle(&worker.id).await? {
                // Picked up new work between the listing and the reset.
                continue;
            }
            reset += 1;
            info!(tenant = slug, worker_id = %worker.id, "reset orphaned working worker");
            self.events.publish(SystemEvent::WorkerStatusChanged {
                tenant: slug.to_string(),
                worker_id: worker.id,
                from: WorkerStatus::Working,
                to: WorkerStatus::Idle,
            });
        }

        Ok(reset)
    }
}

#[async_trait]
impl crate::job_scheduler::JobHandler for HeartbeatAuditor {
    async fn run(&self) -> ConductorResult<()> {
        for tenant in self.tenants.list_active().await? {
            let handle = match self.handles.handle(&tenant.slug).await {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(tenant = %tenant.slug, error = %e, "skipping tenant, no handle");
                    continue;
                }
            };
            if let Err(e) = self.audit_tenant(&handle).await {
                warn!(tenant = %tenant.slug, error = %e, "heartbeat audit failed for tenant");
            }
        }
        Ok(())
    }
}
