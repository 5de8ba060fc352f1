pub mod postgres_activity_repository;
pub mod postgres_message_repository;
pub mod postgres_task_repository;
pub mod postgres_tenant_repository;
pub mod postgres_worker_repository;

pub use postgres_activity_repository::PostgresActivityLogRepository;
pub use postgres_message_repository::PostgresMessageRepository;
pub use postgres_task_repository::PostgresTaskRepository;
pub use postgres_tenant_repository::PostgresTenantRepository;
pub use postgres_worker_repository::PostgresWorkerRepository;
