use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use conductor_core::errors::ConductorResult;
use conductor_core::models::NewTask;
use conductor_core::traits::{TenantHandle, TenantHandleProvider, TenantRepository};

use crate::job_scheduler::JobHandler;

/// Title of the generated inbox task. Deduplication keys on it, so one open
/// inbox task per worker at a time.
pub const INBOX_TASK_TITLE: &str = "Check inbox";

const INBOX_TASK_PRIORITY: i32 = 5;

/// Creates a low-priority inbox task for each worker with unread messages,
/// unless that worker already has one pending or in progress.
pub struct InboxSweep {
    tenants: Arc<dyn TenantRepository>,
    handles: Arc<dyn TenantHandleProvider>,
}

impl InboxSweep {
    pub fn new(tenants: Arc<dyn TenantRepository>, handles: Arc<dyn TenantHandleProvider>) -> Self {
        Self { tenants, handles }
    }

    /// Runs one pass over a single tenant. Returns how many inbox tasks were
    /// created.
    pub async fn sweep_tenant(&self, handle: &TenantHandle) -> ConductorResult<usize> {
        let slug = handle.tenant.slug.as_str();
        let mut created = 0;

        for worker in handle.workers.list().await? {
            let unread = handle.messages.count_unread(&worker.id).await?;
            if unread == 0 {
                continue;
            }
            if handle
                .tasks
                .has_open_task_titled(&worker.id, INBOX_TASK_TITLE)
                .await?
            {
                continue;
            }

            handle
                .tasks
                .create(&NewTask {
                    worker_id: worker.id.clone(),
                    title: INBOX_TASK_TITLE.to_string(),
                    description: Some(format!("{unread} unread message(s) waiting")),
                    priority: INBOX_TASK_PRIORITY,
                })
                .await?;
            created += 1;
            info!(tenant = slug, worker_id = %worker.id, unread, "created inbox task");
        }

        Ok(created)
    }
}

#[async_trait]
impl JobHandler for InboxSweep {
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
                warn!(tenant = %tenant.slug, error = %e, "inbox sweep failed for tenant");
            }
        }
        Ok(())
    }
}
