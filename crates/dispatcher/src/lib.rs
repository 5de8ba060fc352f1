//! Recurring job scheduling and the reconciliation sweeps, plus the boundary
//! to the durable workflow engine.

pub mod assignment_sweep;
pub mod cron_utils;
pub mod heartbeat_auditor;
pub mod inbox_sweep;
pub mod job_scheduler;
pub mod retention_sweep;
pub mod stuck_task_reaper;
pub mod workflow;

pub use assignment_sweep::AssignmentSweep;
pub use cron_utils::CronSchedule;
pub use heartbeat_auditor::HeartbeatAuditor;
pub use inbox_sweep::{InboxSweep, INBOX_TASK_TITLE};
pub use job_scheduler::{JobHandler, JobScheduler};
pub use retention_sweep::RetentionSweep;
pub use stuck_task_reaper::StuckTaskReaper;
pub use workflow::{LocalWorkflowRunner, WorkflowCallbacks};
