//! In-memory mock implementations of the repository and service traits.
//!
//! The mocks reproduce the conditional-update semantics of the Postgres
//! repositories: transition methods return `false` instead of mutating when
//! the guard no longer holds, so race-oriented tests behave like the real
//! store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

use conductor_core::errors::{ConductorError, ConductorResult};
use conductor_core::events::{EventBus, SystemEvent};
use conductor_core::models::{
    ActivityEntry, Message, NewActivityEntry, NewMessage, NewTask, NewTenant, NewWorker, Task,
    TaskPatch, TaskStatus, Tenant, TenantStatus, Worker, WorkerStatus,
};
use conductor_core::traits::{
    ActivityLogRepository, MessageRepository, TaskRepository, TenantHandle, TenantHandleProvider,
    TenantRepository, WorkerRepository, WorkflowInput, WorkflowRunner,
};

/// Mock tenant repository backed by an ordered in-memory list.
#[derive(Debug, Clone, Default)]
pub struct MockTenantRepository {
    tenants: Arc<Mutex<Vec<Tenant>>>,
}

impl MockTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenants(tenants: Vec<Tenant>) -> Self {
        Self {
            tenants: Arc::new(Mutex::new(tenants)),
        }
    }

    pub fn all(&self) -> Vec<Tenant> {
        self.tenants.lock().unwrap().clone()
    }
}

#[async_trait]
impl TenantRepository for MockTenantRepository {
    async fn create(&self, tenant: &NewTenant) -> ConductorResult<Tenant> {
        let mut tenants = self.tenants.lock().unwrap();
        if tenants.iter().any(|t| t.slug == tenant.slug) {
            return Err(ConductorError::conflict(format!(
                "tenant slug already exists: {}",
                tenant.slug
            )));
        }
        let now = Utc::now();
        let created = Tenant {
            id: Uuid::new_v4(),
            slug: tenant.slug.clone(),
            display_name: tenant.display_name.clone(),
            schema_name: format!("tenant_{}", tenant.slug),
            plan: tenant.plan.clone(),
            status: TenantStatus::Provisioning,
            created_at: now,
            updated_at: now,
        };
        tenants.push(created.clone());
        Ok(created)
    }

    async fn find_by_slug(&self, slug: &str) -> ConductorResult<Option<Tenant>> {
        let tenants = self.tenants.lock().unwrap();
        Ok(tenants.iter().find(|t| t.slug == slug).cloned())
    }

    async fn list_active(&self) -> ConductorResult<Vec<Tenant>> {
        let tenants = self.tenants.lock().unwrap();
        Ok(tenants
            .iter()
            .filter(|t| t.status == TenantStatus::Active)
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: Uuid, status: TenantStatus) -> ConductorResult<bool> {
        let mut tenants = self.tenants.lock().unwrap();
        match tenants.iter_mut().find(|t| t.id == id) {
            Some(tenant) => {
                tenant.status = status;
                tenant.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rename(&self, slug: &str, display_name: &str) -> ConductorResult<bool> {
        let mut tenants = self.tenants.lock().unwrap();
        match tenants.iter_mut().find(|t| t.slug == slug) {
            Some(tenant) => {
                tenant.display_name = display_name.to_string();
                tenant.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, slug: &str) -> ConductorResult<bool> {
        let mut tenants = self.tenants.lock().unwrap();
        let before = tenants.len();
        tenants.retain(|t| t.slug != slug);
        Ok(tenants.len() < before)
    }
}

/// Mock task repository with conditional transitions.
#[derive(Debug, Clone, Default)]
pub struct MockTaskRepository {
    tasks: Arc<Mutex<HashMap<Uuid, Task>>>,
}

impl MockTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(tasks.into_iter().map(|t| (t.id, t)).collect())),
        }
    }

    pub fn insert(&self, task: Task) {
        self.tasks.lock().unwrap().insert(task.id, task);
    }

    pub fn get(&self, id: Uuid) -> Option<Task> {
        self.tasks.lock().unwrap().get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

#[async_trait]
impl TaskRepository for MockTaskRepository {
    async fn create(&self, task: &NewTask) -> ConductorResult<Task> {
        let now = Utc::now();
        let created = Task {
            id: Uuid::new_v4(),
            worker_id: task.worker_id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            status: TaskStatus::Pending,
            previous_status: None,
            priority: task.priority,
            error_detail: None,
            workflow_id: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        };
        self.tasks.lock().unwrap().insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> ConductorResult<Option<Task>> {
        Ok(self.tasks.lock().unwrap().get(&id).cloned())
    }

    async fn list_assignable(&self, limit: i64) -> ConductorResult<Vec<Task>> {
        let tasks = self.tasks.lock().unwrap();
        let mut pending: Vec<Task> = tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn list_stuck(&self, cutoff: DateTime<Utc>) -> ConductorResult<Vec<Task>> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks
            .values()
            .filter(|t| {
                t.status == TaskStatus::InProgress
                    && t.started_at.map(|s| s <= cutoff).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn claim(&self, id: Uuid) -> ConductorResult<bool> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::Pending => {
                task.previous_status = Some(task.status);
                task.status = TaskStatus::InProgress;
                task.started_at = Some(Utc::now());
                task.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, id: Uuid) -> ConductorResult<bool> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::InProgress => {
                task.previous_status = Some(task.status);
                task.status = TaskStatus::Pending;
                task.started_at = None;
                task.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn block(&self, id: Uuid, reason: &str) -> ConductorResult<bool> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::InProgress => {
                task.previous_status = Some(task.status);
                task.status = TaskStatus::Blocked;
                task.error_detail = Some(reason.to_string());
                task.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finish(
        &self,
        id: Uuid,
        status: TaskStatus,
        error_detail: Option<&str>,
    ) -> ConductorResult<bool> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(&id) {
            Some(task) if task.status == TaskStatus::InProgress => {
                task.previous_status = Some(task.status);
                task.status = status;
                task.error_detail = error_detail.map(str::to_string);
                task.completed_at = Some(Utc::now());
                task.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_patch(&self, id: Uuid, patch: &TaskPatch) -> ConductorResult<bool> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(&id) {
            Some(task) => {
                if let Some(status) = patch.status {
                    if status != task.status {
                        task.previous_status = Some(task.status);
                        task.status = status;
                    }
                }
                if let Some(detail) = &patch.error_detail {
                    task.error_detail = Some(detail.clone());
                }
                if let Some(at) = patch.completed_at {
                    task.completed_at = Some(at);
                }
                task.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_workflow_started(&self, id: Uuid, workflow_id: &str) -> ConductorResult<bool> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(&id) {
            Some(task) if task.workflow_id.is_none() => {
                task.workflow_id = Some(workflow_id.to_string());
                task.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn has_in_progress_for_worker(&self, worker_id: &str) -> ConductorResult<bool> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks
            .values()
            .any(|t| t.worker_id == worker_id && t.status == TaskStatus::InProgress))
    }

    async fn has_open_task_titled(&self, worker_id: &str, title: &str) -> ConductorResult<bool> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks.values().any(|t| {
            t.worker_id == worker_id
                && t.title == title
                && matches!(t.status, TaskStatus::Pending | TaskStatus::InProgress)
        }))
    }

    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> ConductorResult<u64> {
        let mut tasks = self.tasks.lock().unwrap();
        let before = tasks.len();
        tasks.retain(|_, t| {
            !(t.status.is_terminal() && t.completed_at.unwrap_or(t.updated_at) < cutoff)
        });
        Ok((before - tasks.len()) as u64)
    }
}

/// Mock worker repository with conditional transitions.
#[derive(Debug, Clone, Default)]
pub struct MockWorkerRepository {
    workers: Arc<Mutex<HashMap<String, Worker>>>,
}

impl MockWorkerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(workers: Vec<Worker>) -> Self {
        Self {
            workers: Arc::new(Mutex::new(
                workers.into_iter().map(|w| (w.id.clone(), w)).collect(),
            )),
        }
    }

    pub fn insert(&self, worker: Worker) {
        self.workers.lock().unwrap().insert(worker.id.clone(), worker);
    }

    pub fn get(&self, id: &str) -> Option<Worker> {
        self.workers.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl WorkerRepository for MockWorkerRepository {
    async fn create(&self, worker: &NewWorker) -> ConductorResult<Worker> {
        let now = Utc::now();
        let created = Worker {
            id: worker.id.clone(),
            display_name: worker.display_name.clone(),
            role: worker.role.clone(),
            status: WorkerStatus::Idle,
            current_task_id: None,
            last_active_at: None,
            created_at: now,
            updated_at: now,
        };
        let mut workers = self.workers.lock().unwrap();
        if workers.contains_key(&created.id) {
            return Err(ConductorError::conflict(format!(
                "worker already exists: {}",
                created.id
            )));
        }
        workers.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: &str) -> ConductorResult<Option<Worker>> {
        Ok(self.workers.lock().unwrap().get(id).cloned())
    }

    async fn list(&self) -> ConductorResult<Vec<Worker>> {
        let workers = self.workers.lock().unwrap();
        let mut all: Vec<Worker> = workers.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn list_idle(&self) -> ConductorResult<Vec<Worker>> {
        let workers = self.workers.lock().unwrap();
        Ok(workers
            .values()
            .filter(|w| w.status == WorkerStatus::Idle)
            .cloned()
            .collect())
    }

    async fn list_working(&self) -> ConductorResult<Vec<Worker>> {
        let workers = self.workers.lock().unwrap();
        Ok(workers
            .values()
            .filter(|w| w.status == WorkerStatus::Working)
            .cloned()
            .collect())
    }

    async fn set_status(&self, id: &str, status: WorkerStatus) -> ConductorResult<bool> {
        let mut workers = self.workers.lock().unwrap();
        match workers.get_mut(id) {
            Some(worker) => {
                worker.status = status;
                worker.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn engage(&self, id: &str, task_id: Uuid) -> ConductorResult<bool> {
        let mut workers = self.workers.lock().unwrap();
        match workers.get_mut(id) {
            Some(worker) if worker.status == WorkerStatus::Idle => {
                worker.status = WorkerStatus::Working;
                worker.current_task_id = Some(task_id);
                worker.last_active_at = Some(Utc::now());
                worker.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, id: &str, task_id: Uuid) -> ConductorResult<bool> {
        let mut workers = self.workers.lock().unwrap();
        match workers.get_mut(id) {
            Some(worker)
                if worker.status == WorkerStatus::Working
                    && worker.current_task_id == Some(task_id) =>
            {
                worker.status = WorkerStatus::Idle;
                worker.current_task_id = None;
                worker.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn force_idle(&self, id: &str) -> ConductorResult<bool> {
        let mut workers = self.workers.lock().unwrap();
        match workers.get_mut(id) {
            Some(worker) if worker.status == WorkerStatus::Working => {
                worker.status = WorkerStatus::Idle;
                worker.current_task_id = None;
                worker.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Mock message repository.
#[derive(Debug, Clone, Default)]
pub struct MockMessageRepository {
    messages: Arc<Mutex<HashMap<Uuid, Message>>>,
}

impl MockMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, message: Message) {
        self.messages.lock().unwrap().insert(message.id, message);
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageRepository for MockMessageRepository {
    async fn create(&self, message: &NewMessage) -> ConductorResult<Message> {
        let created = Message {
            id: Uuid::new_v4(),
            sender: message.sender.clone(),
            recipient_id: message.recipient_id.clone(),
            subject: message.subject.clone(),
            body: message.body.clone(),
            read: false,
            created_at: Utc::now(),
        };
        self.messages
            .lock()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn unread_for(&self, recipient_id: &str) -> ConductorResult<Vec<Message>> {
        let messages = self.messages.lock().unwrap();
        Ok(messages
            .values()
            .filter(|m| m.recipient_id == recipient_id && !m.read)
            .cloned()
            .collect())
    }

    async fn count_unread(&self, recipient_id: &str) -> ConductorResult<i64> {
        let messages = self.messages.lock().unwrap();
        Ok(messages
            .values()
            .filter(|m| m.recipient_id == recipient_id && !m.read)
            .count() as i64)
    }

    async fn mark_read(&self, ids: &[Uuid]) -> ConductorResult<u64> {
        let mut messages = self.messages.lock().unwrap();
        let mut updated = 0;
        for id in ids {
            if let Some(message) = messages.get_mut(id) {
                if !message.read {
                    message.read = true;
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    async fn delete_read_before(&self, cutoff: DateTime<Utc>) -> ConductorResult<u64> {
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|_, m| !(m.read && m.created_at < cutoff));
        Ok((before - messages.len()) as u64)
    }
}

/// Mock activity log.
#[derive(Debug, Clone, Default)]
pub struct MockActivityLogRepository {
    entries: Arc<Mutex<Vec<ActivityEntry>>>,
}

impl MockActivityLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<ActivityEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivityLogRepository for MockActivityLogRepository {
    async fn record(&self, entry: &NewActivityEntry) -> ConductorResult<ActivityEntry> {
        let created = ActivityEntry {
            id: Uuid::new_v4(),
            actor: entry.actor.clone(),
            action: entry.action.clone(),
            detail: entry.detail.clone(),
            created_at: Utc::now(),
        };
        self.entries.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn recent(&self, limit: i64) -> ConductorResult<Vec<ActivityEntry>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> ConductorResult<u64> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| e.created_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

/// Event bus that records every published event for assertions.
#[derive(Debug, Clone)]
pub struct MockEventBus {
    sender: broadcast::Sender<SystemEvent>,
    published: Arc<Mutex<Vec<SystemEvent>>>,
}

impl MockEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            sender,
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn published(&self) -> Vec<SystemEvent> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

impl Default for MockEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for MockEventBus {
    fn publish(&self, event: SystemEvent) {
        self.published.lock().unwrap().push(event.clone());
        let _ = self.sender.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.sender.subscribe()
    }
}

/// Workflow runner stub that records each start and returns generated ids.
#[derive(Debug, Clone, Default)]
pub struct StubWorkflowRunner {
    starts: Arc<Mutex<Vec<WorkflowInput>>>,
    counter: Arc<AtomicU64>,
}

impl StubWorkflowRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starts(&self) -> Vec<WorkflowInput> {
        self.starts.lock().unwrap().clone()
    }

    pub fn start_count(&self) -> usize {
        self.starts.lock().unwrap().len()
    }
}

#[async_trait]
impl WorkflowRunner for StubWorkflowRunner {
    async fn start(&self, input: WorkflowInput) -> ConductorResult<String> {
        self.starts.lock().unwrap().push(input);
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("wf-{n}"))
    }
}

/// Workflow runner that always fails, for compensation-path tests.
#[derive(Debug, Clone, Default)]
pub struct FailingWorkflowRunner;

#[async_trait]
impl WorkflowRunner for FailingWorkflowRunner {
    async fn start(&self, _input: WorkflowInput) -> ConductorResult<String> {
        Err(ConductorError::infrastructure(
            "workflow engine unavailable".to_string(),
        ))
    }
}

/// Handle provider backed by a static slug-to-handle map.
#[derive(Clone, Default)]
pub struct MockHandleProvider {
    handles: Arc<Mutex<HashMap<String, TenantHandle>>>,
    evicted: Arc<Mutex<Vec<String>>>,
}

impl MockHandleProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, slug: &str, handle: TenantHandle) {
        self.handles
            .lock()
            .unwrap()
            .insert(slug.to_string(), handle);
    }

    pub fn evicted(&self) -> Vec<String> {
        self.evicted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TenantHandleProvider for MockHandleProvider {
    async fn handle(&self, slug: &str) -> ConductorResult<TenantHandle> {
        let handles = self.handles.lock().unwrap();
        handles
            .get(slug)
            .cloned()
            .ok_or_else(|| ConductorError::tenant_not_found(slug))
    }

    async fn evict(&self, slug: &str) {
        self.handles.lock().unwrap().remove(slug);
        self.evicted.lock().unwrap().push(slug.to_string());
    }

    async fn disconnect_all(&self) {
        self.handles.lock().unwrap().clear();
    }

    async fn cached_slugs(&self) -> Vec<String> {
        self.handles.lock().unwrap().keys().cloned().collect()
    }
}

/// Assembles a [`TenantHandle`] over cloned mocks so tests keep direct
/// access to the underlying stores.
pub fn mock_tenant_handle(
    tenant: Tenant,
    tasks: &MockTaskRepository,
    workers: &MockWorkerRepository,
    messages: &MockMessageRepository,
    activity: &MockActivityLogRepository,
) -> TenantHandle {
    TenantHandle {
        tenant,
        tasks: Arc::new(tasks.clone()),
        workers: Arc::new(workers.clone()),
        messages: Arc::new(messages.clone()),
        activity: Arc::new(activity.clone()),
    }
}
