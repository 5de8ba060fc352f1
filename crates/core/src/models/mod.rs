pub mod activity;
pub mod job;
pub mod message;
pub mod patch;
pub mod task;
pub mod tenant;
pub mod worker;

pub use activity::{ActivityEntry, NewActivityEntry};
pub use job::{Job, JobStatus};
pub use message::{Message, NewMessage};
pub use patch::TaskPatch;
pub use task::{NewTask, Task, TaskStatus};
pub use tenant::{derive_slug, validate_slug, NewTenant, Tenant, TenantStatus};
pub use worker::{NewWorker, Worker, WorkerStatus};
