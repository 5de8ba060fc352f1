use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{TaskStatus, TenantStatus, WorkerStatus};

/// Events published on the shared bus. Delivery is at-least-once, so every
/// consumer must tolerate replays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemEvent {
    WorkerStatusChanged {
        tenant: String,
        worker_id: String,
        from: WorkerStatus,
        to: WorkerStatus,
    },
    TaskFailed {
        tenant: String,
        task_id: Uuid,
        reason: String,
    },
    TaskProgress {
        tenant: String,
        task_id: Uuid,
        percent: u8,
        note: Option<String>,
    },
    TaskCompleted {
        tenant: String,
        task_id: Uuid,
        status: TaskStatus,
    },
    JobCompleted {
        name: String,
        duration_ms: u64,
    },
    JobFailed {
        name: String,
        error: String,
    },
    TenantLifecycle {
        slug: String,
        status: TenantStatus,
    },
}

/// Publish/subscribe seam for system events. Implementations fan events out
/// to any number of subscribers; publishing never blocks on slow consumers.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: SystemEvent);

    fn subscribe(&self) -> broadcast::Receiver<SystemEvent>;
}
