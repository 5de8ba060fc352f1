use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use conductor_core::errors::ConductorResult;
use conductor_core::models::{NewTask, Task, TaskPatch, TaskStatus};
use conductor_core::traits::TaskRepository;

/// Task store scoped to one tenant schema. The pool's `search_path` is
/// pinned by the pool manager, so table names stay unqualified here.
///
/// Every transition is a single conditional UPDATE whose WHERE clause
/// re-checks the expected current state; `rows_affected` decides whether the
/// transition happened. Two concurrent passes can both attempt the same
/// transition and exactly one wins.
pub struct PostgresTaskRepository {
    pool: PgPool,
}

impl PostgresTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &sqlx::postgres::PgRow) -> ConductorResult<Task> {
        Ok(Task {
            id: row.try_get("id")?,
            worker_id: row.try_get("worker_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            status: row.try_get("status")?,
            previous_status: row.try_get("previous_status")?,
            priority: row.try_get("priority")?,
            error_detail: row.try_get("error_detail")?,
            workflow_id: row.try_get("workflow_id")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const TASK_COLUMNS: &str = "id, worker_id, title, description, status, previous_status, priority, \
     error_detail, workflow_id, created_at, started_at, completed_at, updated_at";

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn create(&self, task: &NewTask) -> ConductorResult<Task> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tasks (id, worker_id, title, description, status, priority, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'pending', $5, NOW(), NOW())
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&task.worker_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_task(&row)
    }

    async fn find_by_id(&self, id: Uuid) -> ConductorResult<Option<Task>> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn list_assignable(&self, limit: i64) -> ConductorResult<Vec<Task>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TASK_COLUMNS} FROM tasks
            WHERE status = 'pending'
            ORDER BY priority ASC, created_at ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn list_stuck(&self, cutoff: DateTime<Utc>) -> ConductorResult<Vec<Task>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TASK_COLUMNS} FROM tasks
            WHERE status = 'in_progress' AND started_at <= $1
            "#
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_task).collect()
    }

    async fn claim(&self, id: Uuid) -> ConductorResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'in_progress', previous_status = status,
                started_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        let claimed = result.rows_affected() > 0;
        debug!(task_id = %id, claimed, "task claim attempt");
        Ok(claimed)
    }

    async fn release(&self, id: Uuid) -> ConductorResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending', previous_status = status,
                started_at = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn block(&self, id: Uuid, reason: &str) -> ConductorResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'blocked', previous_status = status,
                error_detail = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn finish(
        &self,
        id: Uuid,
        status: TaskStatus,
        error_detail: Option<&str>,
    ) -> ConductorResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = $2, previous_status = status, error_detail = $3,
                completed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(error_detail)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn apply_patch(&self, id: Uuid, patch: &TaskPatch) -> ConductorResult<bool> {
        if patch.is_empty() {
            return Ok(false);
        }

        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET previous_status = CASE WHEN $2::varchar IS NOT NULL AND $2 <> status
                                       THEN status ELSE previous_status END,
                status = COALESCE($2, status),
                error_detail = COALESCE($3, error_detail),
                completed_at = COALESCE($4, completed_at),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.status)
        .bind(&patch.error_detail)
        .bind(patch.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_workflow_started(&self, id: Uuid, workflow_id: &str) -> ConductorResult<bool> {
        // First writer wins; a retried start never overwrites the recorded id.
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET workflow_id = $2, updated_at = NOW()
            WHERE id = $1 AND workflow_id IS NULL
            "#,
        )
        .bind(id)
        .bind(workflow_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn has_in_progress_for_worker(&self, worker_id: &str) -> ConductorResult<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM tasks WHERE worker_id = $1 AND status = 'in_progress'",
        )
        .bind(worker_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<i64, _>("count")? > 0)
    }

    async fn has_open_task_titled(&self, worker_id: &str, title: &str) -> ConductorResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count FROM tasks
            WHERE worker_id = $1 AND title = $2 AND status IN ('pending', 'in_progress')
            "#,
        )
        .bind(worker_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<i64, _>("count")? > 0)
    }

    async fn delete_finished_before(&self, cutoff: DateTime<Utc>) -> ConductorResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM tasks
            WHERE status IN ('completed', 'failed', 'cancelled')
              AND COALESCE(completed_at, updated_at) < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
