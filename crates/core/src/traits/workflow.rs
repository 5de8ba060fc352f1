//! Boundary to the external durable execution engine.
//!
//! The core's responsibility ends at handing over a claimed task; execution,
//! replay and crash recovery belong to the engine behind this seam. Results
//! come back through the narrow callback surface in the dispatcher, never
//! through this trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::ConductorResult;

/// Payload handed to the workflow runner for one claimed task.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WorkflowInput {
    pub task_id: Uuid,
    pub worker_id: String,
    pub tenant_slug: String,
    /// Opaque material the execution engine feeds to the worker. The core
    /// never interprets it.
    pub prompt_materials: serde_json::Value,
}

/// Fire-and-forget hand-off to a replayable execution engine.
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    /// Starts a durable workflow and returns its id. The call must return
    /// once the start is accepted; the core never blocks on completion. No
    /// retry is attempted here, the caller compensates on failure.
    async fn start(&self, input: WorkflowInput) -> ConductorResult<String>;
}
