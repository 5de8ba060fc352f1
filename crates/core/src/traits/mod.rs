pub mod repository;
pub mod service;
pub mod workflow;

pub use repository::{
    ActivityLogRepository, MessageRepository, TaskRepository, TenantHandle, TenantHandleProvider,
    TenantRepository, WorkerRepository,
};
pub use service::{JobControl, TenantLifecycle};
pub use workflow::{WorkflowInput, WorkflowRunner};
