use std::sync::Arc;

use conductor_core::events::SystemEvent;
use conductor_core::models::WorkerStatus;
use conductor_core::traits::TenantHandle;
use conductor_dispatcher::HeartbeatAuditor;
use conductor_testing_utils::{
    mock_tenant_handle, MockActivityLogRepository, MockEventBus, MockHandleProvider,
    MockMessageRepository, MockTaskRepository, MockTenantRepository, MockWorkerRepository,
    TaskBuilder, TenantBuilder, WorkerBuilder,
};

struct Fixture {
    auditor: HeartbeatAuditor,
    handle: TenantHandle,
    tasks: MockTaskRepository,
    workers: MockWorkerRepository,
    events: MockEventBus,
}

fn fixture() -> Fixture {
    let tasks = MockTaskRepository::new();
    let workers = MockWorkerRepository::new();
    let messages = MockMessageRepository::new();
    let activity = MockActivityLogRepository::new();
    let events = MockEventBus::new();

    let tenant = TenantBuilder::new().with_slug("acme").build();
    let handle = mock_tenant_handle(tenant, &tasks, &workers, &messages, &activity);
    let provider = MockHandleProvider::new();
    provider.insert("acme", handle.clone());

    let auditor = HeartbeatAuditor::new(
        Arc::new(MockTenantRepository::new()),
        Arc::new(provider),
        Arc::new(events.clone()),
    );

    Fixture {
        auditor,
        handle,
        tasks,
        workers,
        events,
    }
}

#[tokio::test]
async fn test_orphaned_working_worker_is_reset() {
    let f = fixture();
    let gone = TaskBuilder::new().build();
    f.workers.insert(
        WorkerBuilder::new()
            .with_id("dev_1")
            .working_on(gone.id)
            .build(),
    );
    // No in_progress task exists for dev_1.

    let reset = f.auditor.audit_tenant(&f.handle).await.unwrap();
    assert_eq!(reset, 1);

    let worker = f.workers.get("dev_1").unwrap();
    assert_eq!(worker.status, WorkerStatus::Idle);
    assert!(worker.current_task_id.is_none());

    assert!(f.events.published().iter().any(|e| matches!(
        e,
        SystemEvent::WorkerStatusChanged {
            to: WorkerStatus::Idle,
            ..
        }
    )));
}

#[tokio::test]
async fn test_backed_working_worker_is_untouched() {
    let f = fixture();
    let task = TaskBuilder::new()
        .with_worker("dev_1")
        .started_minutes_ago(2)
        .build();
    f.tasks.insert(task.clone());
    f.workers.insert(
        WorkerBuilder::new()
            .with_id("dev_1")
            .working_on(task.id)
            .build(),
    );

    let reset = f.auditor.audit_tenant(&f.handle).await.unwrap();
    assert_eq!(reset, 0);
    assert_eq!(f.workers.get("dev_1").unwrap().status, WorkerStatus::Working);
    assert_eq!(f.events.published_count(), 0);
}

#[tokio::test]
async fn test_idle_and_blocked_workers_are_ignored() {
    let f = fixture();
    f.workers.insert(WorkerBuilder::new().with_id("idler").build());
    f.workers.insert(
        WorkerBuilder::new()
            .with_id("stalled")
            .with_status(WorkerStatus::Blocked)
            .build(),
    );

    let reset = f.auditor.audit_tenant(&f.handle).await.unwrap();
    assert_eq!(reset, 0);
}
