//! Infrastructure implementations: Postgres repositories, tenant schema
//! provisioning, the tenant handle cache, seeding, and the in-memory event
//! bus.

pub mod database;
pub mod event_bus;
pub mod seed;
pub mod tenant;

pub use database::postgres::{
    PostgresActivityLogRepository, PostgresMessageRepository, PostgresTaskRepository,
    PostgresTenantRepository, PostgresWorkerRepository,
};
pub use database::provisioner::{SchemaManager, SchemaProvisioner};
pub use event_bus::InMemoryEventBus;
pub use tenant::pool_manager::TenantPoolManager;
pub use tenant::registry::TenantRegistry;
