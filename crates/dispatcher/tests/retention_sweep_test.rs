use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use conductor_core::config::SweepConfig;
use conductor_core::models::{Message, TaskStatus};
use conductor_core::traits::TenantHandle;
use conductor_dispatcher::RetentionSweep;
use conductor_testing_utils::{
    mock_tenant_handle, MockActivityLogRepository, MockHandleProvider, MockMessageRepository,
    MockTaskRepository, MockTenantRepository, MockWorkerRepository, TaskBuilder, TenantBuilder,
};

struct Fixture {
    sweep: RetentionSweep,
    handle: TenantHandle,
    tasks: MockTaskRepository,
    messages: MockMessageRepository,
}

fn fixture() -> Fixture {
    let tasks = MockTaskRepository::new();
    let workers = MockWorkerRepository::new();
    let messages = MockMessageRepository::new();
    let activity = MockActivityLogRepository::new();

    let tenant = TenantBuilder::new().with_slug("acme").build();
    let handle = mock_tenant_handle(tenant, &tasks, &workers, &messages, &activity);
    let provider = MockHandleProvider::new();
    provider.insert("acme", handle.clone());

    let sweep = RetentionSweep::new(
        Arc::new(MockTenantRepository::new()),
        Arc::new(provider),
        &SweepConfig::default(),
    );

    Fixture {
        sweep,
        handle,
        tasks,
        messages,
    }
}

fn message(read: bool, days_old: i64) -> Message {
    Message {
        id: Uuid::new_v4(),
        sender: "system".to_string(),
        recipient_id: "dev_1".to_string(),
        subject: None,
        body: "old news".to_string(),
        read,
        created_at: Utc::now() - Duration::days(days_old),
    }
}

#[tokio::test]
async fn test_old_finished_tasks_are_deleted() {
    let f = fixture();

    let mut ancient = TaskBuilder::new()
        .with_worker("dev_1")
        .with_status(TaskStatus::Completed)
        .build();
    ancient.completed_at = Some(Utc::now() - Duration::days(40));
    f.tasks.insert(ancient.clone());

    let mut fresh = TaskBuilder::new()
        .with_worker("dev_1")
        .with_status(TaskStatus::Completed)
        .build();
    fresh.completed_at = Some(Utc::now() - Duration::days(1));
    f.tasks.insert(fresh.clone());

    f.sweep.sweep_tenant(&f.handle).await.unwrap();

    assert!(f.tasks.get(ancient.id).is_none());
    assert!(f.tasks.get(fresh.id).is_some());
}

#[tokio::test]
async fn test_open_tasks_survive_regardless_of_age() {
    let f = fixture();

    let pending = TaskBuilder::new()
        .with_worker("dev_1")
        .created_minutes_ago(60 * 24 * 90)
        .build();
    f.tasks.insert(pending.clone());

    f.sweep.sweep_tenant(&f.handle).await.unwrap();

    assert!(f.tasks.get(pending.id).is_some());
}

#[tokio::test]
async fn test_only_old_read_messages_are_deleted() {
    let f = fixture();

    f.messages.insert(message(true, 70));
    f.messages.insert(message(false, 70));
    f.messages.insert(message(true, 1));

    f.sweep.sweep_tenant(&f.handle).await.unwrap();

    // The old unread and the recent read message both survive.
    assert_eq!(f.messages.count(), 2);
}
