//! Builders for test entities with sensible defaults.

use chrono::{Duration, Utc};
use uuid::Uuid;

use conductor_core::models::{Task, TaskStatus, Tenant, TenantStatus, Worker, WorkerStatus};

pub struct TenantBuilder {
    tenant: Tenant,
}

impl TenantBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            tenant: Tenant {
                id: Uuid::new_v4(),
                slug: "test_org".to_string(),
                display_name: "Test Org".to_string(),
                schema_name: "tenant_test_org".to_string(),
                plan: "free".to_string(),
                status: TenantStatus::Active,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_slug(mut self, slug: &str) -> Self {
        self.tenant.slug = slug.to_string();
        self.tenant.schema_name = format!("tenant_{slug}");
        self
    }

    pub fn with_display_name(mut self, name: &str) -> Self {
        self.tenant.display_name = name.to_string();
        self
    }

    pub fn with_status(mut self, status: TenantStatus) -> Self {
        self.tenant.status = status;
        self
    }

    pub fn build(self) -> Tenant {
        self.tenant
    }
}

impl Default for TenantBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            task: Task {
                id: Uuid::new_v4(),
                worker_id: "worker-1".to_string(),
                title: "test task".to_string(),
                description: None,
                status: TaskStatus::Pending,
                previous_status: None,
                priority: 5,
                error_detail: None,
                workflow_id: None,
                created_at: now,
                started_at: None,
                completed_at: None,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.task.id = id;
        self
    }

    pub fn with_worker(mut self, worker_id: &str) -> Self {
        self.task.worker_id = worker_id.to_string();
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.task.title = title.to_string();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.task.priority = priority;
        self
    }

    /// Marks the task in progress with a start time this many minutes ago.
    pub fn started_minutes_ago(mut self, minutes: i64) -> Self {
        self.task.status = TaskStatus::InProgress;
        self.task.started_at = Some(Utc::now() - Duration::minutes(minutes));
        self
    }

    pub fn created_minutes_ago(mut self, minutes: i64) -> Self {
        self.task.created_at = Utc::now() - Duration::minutes(minutes);
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WorkerBuilder {
    worker: Worker,
}

impl WorkerBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            worker: Worker {
                id: "worker-1".to_string(),
                display_name: "Worker One".to_string(),
                role: "generalist".to_string(),
                status: WorkerStatus::Idle,
                current_task_id: None,
                last_active_at: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.worker.id = id.to_string();
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.worker.role = role.to_string();
        self
    }

    pub fn with_status(mut self, status: WorkerStatus) -> Self {
        self.worker.status = status;
        self
    }

    pub fn working_on(mut self, task_id: Uuid) -> Self {
        self.worker.status = WorkerStatus::Working;
        self.worker.current_task_id = Some(task_id);
        self
    }

    pub fn build(self) -> Worker {
        self.worker
    }
}

impl Default for WorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
