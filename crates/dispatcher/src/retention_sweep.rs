use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use conductor_core::config::SweepConfig;
use conductor_core::errors::ConductorResult;
use conductor_core::traits::{TenantHandle, TenantHandleProvider, TenantRepository};

use crate::job_scheduler::JobHandler;

/// Deletes old finished tasks, read messages and activity entries per
/// tenant. Unread messages and open tasks are never touched.
pub struct RetentionSweep {
    tenants: Arc<dyn TenantRepository>,
    handles: Arc<dyn TenantHandleProvider>,
    task_retention_days: i64,
    message_retention_days: i64,
}

impl RetentionSweep {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        handles: Arc<dyn TenantHandleProvider>,
        config: &SweepConfig,
    ) -> Self {
        Self {
            tenants,
            handles,
            task_retention_days: config.task_retention_days,
            message_retention_days: config.message_retention_days,
        }
    }

    pub async fn sweep_tenant(&self, handle: &TenantHandle) -> ConductorResult<()> {
        let slug = handle.tenant.slug.as_str();
        let now = Utc::now();

        let task_cutoff = now - Duration::days(self.task_retention_days);
        let message_cutoff = now - Duration::days(self.message_retention_days);

        let tasks = handle.tasks.delete_finished_before(task_cutoff).await?;
        let messages = handle.messages.delete_read_before(message_cutoff).await?;
        let activity = handle.activity.delete_before(message_cutoff).await?;

        if tasks + messages + activity > 0 {
            info!(tenant = slug, tasks, messages, activity, "retention sweep deleted rows");
        }
        Ok(())
    }
}

#[async_trait]
impl JobHandler for RetentionSweep {
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
                warn!(tenant = %tenant.slug, error = %e, "retention sweep failed for tenant");
            }
        }
        Ok(())
    }
}
