//! Full lifecycle of one task: assignment, timeout, reap, audit.

use std::sync::Arc;

use conductor_core::models::{TaskStatus, WorkerStatus};
use conductor_core::traits::TenantHandle;
use conductor_dispatcher::{AssignmentSweep, HeartbeatAuditor, StuckTaskReaper};
use conductor_testing_utils::{
    mock_tenant_handle, MockActivityLogRepository, MockEventBus, MockHandleProvider,
    MockMessageRepository, MockTaskRepository, MockTenantRepository, MockWorkerRepository,
    StubWorkflowRunner, TaskBuilder, TenantBuilder, WorkerBuilder,
};

struct Fixture {
    handle: TenantHandle,
    tasks: MockTaskRepository,
    workers: MockWorkerRepository,
    sweep: AssignmentSweep,
    reaper: StuckTaskReaper,
    auditor: HeartbeatAuditor,
    runner: StubWorkflowRunner,
}

fn fixture() -> Fixture {
    let tasks = MockTaskRepository::new();
    let workers = MockWorkerRepository::new();
    let messages = MockMessageRepository::new();
    let activity = MockActivityLogRepository::new();
    let events = MockEventBus::new();
    let runner = StubWorkflowRunner::new();

    let tenant = TenantBuilder::new()
        .with_slug("blue_ocean")
        .with_display_name("Blue Ocean")
        .build();
    let handle = mock_tenant_handle(tenant, &tasks, &workers, &messages, &activity);
    let provider = MockHandleProvider::new();
    provider.insert("blue_ocean", handle.clone());

    let tenants: Arc<MockTenantRepository> = Arc::new(MockTenantRepository::new());
    let provider: Arc<MockHandleProvider> = Arc::new(provider);
    let events: Arc<MockEventBus> = Arc::new(events);

    Fixture {
        handle,
        tasks,
        workers,
        sweep: AssignmentSweep::new(
            tenants.clone(),
            provider.clone(),
            Arc::new(runner.clone()),
            events.clone(),
        ),
        reaper: StuckTaskReaper::new(tenants.clone(), provider.clone(), events.clone(), 30),
        auditor: HeartbeatAuditor::new(tenants, provider, events),
        runner,
    }
}

#[tokio::test]
async fn test_task_lifecycle_through_timeout() {
    let f = fixture();

    f.workers
        .insert(WorkerBuilder::new().with_id("ceo").with_role("ceo").build());
    let task = TaskBuilder::new()
        .with_worker("ceo")
        .with_title("Draft the launch plan")
        .with_priority(1)
        .build();
    f.tasks.insert(task.clone());

    // First sweep hands the task to the workflow engine.
    assert_eq!(f.sweep.sweep_tenant(&f.handle).await.unwrap(), 1);
    let started = f.tasks.get(task.id).unwrap();
    assert_eq!(started.status, TaskStatus::InProgress);
    assert!(started.workflow_id.is_some());
    assert_eq!(
        f.workers.get("ceo").unwrap().current_task_id,
        Some(task.id)
    );

    // Second sweep finds nothing assignable.
    assert_eq!(f.sweep.sweep_tenant(&f.handle).await.unwrap(), 0);
    assert_eq!(f.runner.start_count(), 1);

    // The workflow stalls; backdate the start past the timeout.
    let mut stalled = f.tasks.get(task.id).unwrap();
    stalled.started_at = Some(chrono::Utc::now() - chrono::Duration::minutes(31));
    f.tasks.insert(stalled);

    assert_eq!(f.reaper.reap_tenant(&f.handle).await.unwrap(), 1);
    assert_eq!(f.tasks.get(task.id).unwrap().status, TaskStatus::Blocked);
    assert_eq!(f.workers.get("ceo").unwrap().status, WorkerStatus::Idle);

    // Auditor finds nothing left to repair.
    assert_eq!(f.auditor.audit_tenant(&f.handle).await.unwrap(), 0);
}

#[tokio::test]
async fn test_auditor_repairs_partial_reap() {
    let f = fixture();

    let task = TaskBuilder::new().with_worker("ceo").build();
    // Worker stuck in working with no in_progress task behind it, as if a
    // completion landed on the task but the worker write never did.
    f.workers.insert(
        WorkerBuilder::new()
            .with_id("ceo")
            .working_on(task.id)
            .build(),
    );

    assert_eq!(f.auditor.audit_tenant(&f.handle).await.unwrap(), 1);
    assert_eq!(f.workers.get("ceo").unwrap().status, WorkerStatus::Idle);

    // Freed worker can take new work on the next sweep.
    f.tasks.insert(TaskBuilder::new().with_worker("ceo").build());
    assert_eq!(f.sweep.sweep_tenant(&f.handle).await.unwrap(), 1);
}
