use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::TaskStatus;

/// Partial update for a task. Only fields actually set are written; the
/// builder keeps callers from assembling ad hoc field maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub error_detail: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn error_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.error_detail.is_none() && self.completed_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_builder_only_sets_provided_fields() {
        let patch = TaskPatch::new().status(TaskStatus::Completed);
        assert_eq!(patch.status, Some(TaskStatus::Completed));
        assert!(patch.error_detail.is_none());
        assert!(patch.completed_at.is_none());
    }

    #[test]
    fn test_empty_patch() {
        assert!(TaskPatch::new().is_empty());
        assert!(!TaskPatch::new().error_detail("boom").is_empty());
    }
}
