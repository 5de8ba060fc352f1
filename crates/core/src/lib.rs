pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod traits;

pub use config::*;
pub use errors::{ConductorError, ConductorResult};
pub use events::{EventBus, SystemEvent};
pub use models::{
    derive_slug, ActivityEntry, Job, JobStatus, Message, NewActivityEntry, NewMessage, NewTask,
    NewTenant, NewWorker, Task, TaskPatch, TaskStatus, Tenant, TenantStatus, Worker, WorkerStatus,
};
pub use traits::{
    ActivityLogRepository, JobControl, MessageRepository, TaskRepository, TenantHandle,
    TenantHandleProvider, TenantLifecycle, TenantRepository, WorkerRepository, WorkflowInput,
    WorkflowRunner,
};
