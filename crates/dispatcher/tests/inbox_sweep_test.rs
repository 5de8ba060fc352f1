use std::sync::Arc;

use conductor_core::models::NewMessage;
use conductor_core::traits::{MessageRepository, TenantHandle};
use conductor_dispatcher::{InboxSweep, INBOX_TASK_TITLE};
use conductor_testing_utils::{
    mock_tenant_handle, MockActivityLogRepository, MockHandleProvider, MockMessageRepository,
    MockTaskRepository, MockTenantRepository, MockWorkerRepository, TaskBuilder, TenantBuilder,
    WorkerBuilder,
};

struct Fixture {
    sweep: InboxSweep,
    handle: TenantHandle,
    tasks: MockTaskRepository,
    workers: MockWorkerRepository,
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

    let sweep = InboxSweep::new(Arc::new(MockTenantRepository::new()), Arc::new(provider));

    Fixture {
        sweep,
        handle,
        tasks,
        workers,
        messages,
    }
}

async fn send(messages: &MockMessageRepository, recipient: &str) {
    messages
        .create(&NewMessage {
            sender: "system".to_string(),
            recipient_id: recipient.to_string(),
            subject: Some("ping".to_string()),
            body: "hello".to_string(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unread_messages_produce_one_inbox_task() {
    let f = fixture();
    f.workers.insert(WorkerBuilder::new().with_id("dev_1").build());
    send(&f.messages, "dev_1").await;
    send(&f.messages, "dev_1").await;

    let created = f.sweep.sweep_tenant(&f.handle).await.unwrap();
    assert_eq!(created, 1);
    assert_eq!(f.tasks.count(), 1);

    // A second pass sees the open inbox task and creates nothing.
    let created = f.sweep.sweep_tenant(&f.handle).await.unwrap();
    assert_eq!(created, 0);
    assert_eq!(f.tasks.count(), 1);
}

#[tokio::test]
async fn test_no_unread_means_no_task() {
    let f = fixture();
    f.workers.insert(WorkerBuilder::new().with_id("dev_1").build());

    let created = f.sweep.sweep_tenant(&f.handle).await.unwrap();
    assert_eq!(created, 0);
    assert_eq!(f.tasks.count(), 0);
}

#[tokio::test]
async fn test_finished_inbox_task_allows_a_new_one() {
    let f = fixture();
    f.workers.insert(WorkerBuilder::new().with_id("dev_1").build());
    send(&f.messages, "dev_1").await;

    // A completed inbox task no longer counts as open.
    f.tasks.insert(
        TaskBuilder::new()
            .with_worker("dev_1")
            .with_title(INBOX_TASK_TITLE)
            .with_status(conductor_core::models::TaskStatus::Completed)
            .build(),
    );

    let created = f.sweep.sweep_tenant(&f.handle).await.unwrap();
    assert_eq!(created, 1);
    assert_eq!(f.tasks.count(), 2);
}
