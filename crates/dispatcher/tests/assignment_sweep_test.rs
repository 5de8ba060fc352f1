use std::sync::Arc;

use conductor_core::models::{TaskStatus, WorkerStatus};
use conductor_core::traits::{TenantHandle, WorkflowRunner};
use conductor_dispatcher::job_scheduler::JobHandler;
use conductor_dispatcher::AssignmentSweep;
use conductor_testing_utils::{
    mock_tenant_handle, FailingWorkflowRunner, MockActivityLogRepository, MockEventBus,
    MockHandleProvider, MockMessageRepository, MockTaskRepository, MockTenantRepository,
    MockWorkerRepository, StubWorkflowRunner, TaskBuilder, TenantBuilder, WorkerBuilder,
};

struct Fixture {
    sweep: AssignmentSweep,
    handle: TenantHandle,
    tasks: MockTaskRepository,
    workers: MockWorkerRepository,
    runner: StubWorkflowRunner,
    events: MockEventBus,
}

fn fixture_with_runner(runner: Arc<dyn WorkflowRunner>) -> Fixture {
    let tasks = MockTaskRepository::new();
    let workers = MockWorkerRepository::new();
    let messages = MockMessageRepository::new();
    let activity = MockActivityLogRepository::new();
    let events = MockEventBus::new();

    let tenant = TenantBuilder::new().with_slug("acme").build();
    let handle = mock_tenant_handle(tenant, &tasks, &workers, &messages, &activity);

    let provider = MockHandleProvider::new();
    provider.insert("acme", handle.clone());

    let sweep = AssignmentSweep::new(
        Arc::new(MockTenantRepository::new()),
        Arc::new(provider),
        runner,
        Arc::new(events.clone()),
    );

    Fixture {
        sweep,
        handle,
        tasks,
        workers,
        runner: StubWorkflowRunner::new(),
        events,
    }
}

fn fixture() -> Fixture {
    let runner = StubWorkflowRunner::new();
    let mut f = fixture_with_runner(Arc::new(runner.clone()));
    f.runner = runner;
    f
}

#[tokio::test]
async fn test_sweep_starts_pending_task() {
    let f = fixture();
    f.workers.insert(WorkerBuilder::new().with_id("dev_1").build());
    let task = TaskBuilder::new().with_worker("dev_1").build();
    f.tasks.insert(task.clone());

    let started = f.sweep.sweep_tenant(&f.handle).await.unwrap();
    assert_eq!(started, 1);

    let task = f.tasks.get(task.id).unwrap();
    assert_eq!(task.status, TaskStatus::InProgress);
    assert!(task.started_at.is_some());
    assert_eq!(task.workflow_id.as_deref(), Some("wf-0"));

    let worker = f.workers.get("dev_1").unwrap();
    assert_eq!(worker.status, WorkerStatus::Working);
    assert_eq!(worker.current_task_id, Some(task.id));

    assert_eq!(f.runner.start_count(), 1);
    let input = &f.runner.starts()[0];
    assert_eq!(input.tenant_slug, "acme");
    assert_eq!(input.worker_id, "dev_1");

    assert!(f.events.published().iter().any(|e| matches!(
        e,
        conductor_core::events::SystemEvent::WorkerStatusChanged { .. }
    )));
}

#[tokio::test]
async fn test_second_sweep_changes_nothing() {
    let f = fixture();
    f.workers.insert(WorkerBuilder::new().with_id("dev_1").build());
    f.tasks.insert(TaskBuilder::new().with_worker("dev_1").build());

    assert_eq!(f.sweep.sweep_tenant(&f.handle).await.unwrap(), 1);
    assert_eq!(f.sweep.sweep_tenant(&f.handle).await.unwrap(), 0);
    assert_eq!(f.runner.start_count(), 1);
}

#[tokio::test]
async fn test_concurrent_sweeps_claim_exactly_once() {
    let f = fixture();
    f.workers.insert(WorkerBuilder::new().with_id("dev_1").build());
    f.tasks.insert(TaskBuilder::new().with_worker("dev_1").build());

    // Both passes see the same pending task; the conditional claim lets
    // only one of them through.
    let (a, b) = tokio::join!(
        f.sweep.sweep_tenant(&f.handle),
        f.sweep.sweep_tenant(&f.handle)
    );
    assert_eq!(a.unwrap() + b.unwrap(), 1);
    assert_eq!(f.runner.start_count(), 1);
}

#[tokio::test]
async fn test_workflow_failure_reverts_both_claims() {
    let f = fixture_with_runner(Arc::new(FailingWorkflowRunner));
    f.workers.insert(WorkerBuilder::new().with_id("dev_1").build());
    let task = TaskBuilder::new().with_worker("dev_1").build();
    f.tasks.insert(task.clone());

    let started = f.sweep.sweep_tenant(&f.handle).await.unwrap();
    assert_eq!(started, 0);

    let task = f.tasks.get(task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.started_at.is_none());
    assert!(task.workflow_id.is_none());

    let worker = f.workers.get("dev_1").unwrap();
    assert_eq!(worker.status, WorkerStatus::Idle);
    assert!(worker.current_task_id.is_none());
}

#[tokio::test]
async fn test_urgent_task_goes_first_within_idle_capacity() {
    let f = fixture();
    f.workers.insert(WorkerBuilder::new().with_id("dev_1").build());

    let urgent = TaskBuilder::new()
        .with_worker("dev_1")
        .with_title("urgent")
        .with_priority(1)
        .build();
    let routine = TaskBuilder::new()
        .with_worker("dev_1")
        .with_title("routine")
        .with_priority(9)
        .created_minutes_ago(60)
        .build();
    f.tasks.insert(urgent.clone());
    f.tasks.insert(routine.clone());

    // One idle worker, so only the most urgent task starts.
    let started = f.sweep.sweep_tenant(&f.handle).await.unwrap();
    assert_eq!(started, 1);
    assert_eq!(f.tasks.get(urgent.id).unwrap().status, TaskStatus::InProgress);
    assert_eq!(f.tasks.get(routine.id).unwrap().status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_busy_assignee_gets_task_back() {
    let f = fixture();
    let other_task = TaskBuilder::new().build();
    f.workers.insert(WorkerBuilder::new().with_id("idler").build());
    f.workers.insert(
        WorkerBuilder::new()
            .with_id("busy")
            .working_on(other_task.id)
            .build(),
    );
    let task = TaskBuilder::new().with_worker("busy").build();
    f.tasks.insert(task.clone());

    let started = f.sweep.sweep_tenant(&f.handle).await.unwrap();
    assert_eq!(started, 0);

    // Claim was unwound once the engage failed.
    let task = f.tasks.get(task.id).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.started_at.is_none());
}

#[tokio::test]
async fn test_run_skips_tenants_without_handles() {
    let tasks = MockTaskRepository::new();
    let workers = MockWorkerRepository::new();
    let messages = MockMessageRepository::new();
    let activity = MockActivityLogRepository::new();
    let runner = StubWorkflowRunner::new();

    let reachable = TenantBuilder::new().with_slug("reachable").build();
    let orphaned = TenantBuilder::new().with_slug("orphaned").build();
    let tenants = MockTenantRepository::with_tenants(vec![reachable.clone(), orphaned]);

    let provider = MockHandleProvider::new();
    provider.insert(
        "reachable",
        mock_tenant_handle(reachable, &tasks, &workers, &messages, &activity),
    );

    workers.insert(WorkerBuilder::new().with_id("dev_1").build());
    let task = TaskBuilder::new().with_worker("dev_1").build();
    tasks.insert(task.clone());

    let sweep = AssignmentSweep::new(
        Arc::new(tenants),
        Arc::new(provider),
        Arc::new(runner.clone()),
        Arc::new(MockEventBus::new()),
    );

    // The tenant with no handle must not abort the pass.
    sweep.run().await.unwrap();
    assert_eq!(tasks.get(task.id).unwrap().status, TaskStatus::InProgress);
    assert_eq!(runner.start_count(), 1);
}
