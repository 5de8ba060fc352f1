use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use conductor_core::errors::ConductorResult;
use conductor_core::models::{NewWorker, Worker, WorkerStatus};
use conductor_core::traits::WorkerRepository;

/// Worker store scoped to one tenant schema. Transitions follow the same
/// conditional-UPDATE discipline as the task store.
pub struct PostgresWorkerRepository {
    pool: PgPool,
}

impl PostgresWorkerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_worker(row: &sqlx::postgres::PgRow) -> ConductorResult<Worker> {
        Ok(Worker {
            id: row.try_get("id")?,
            display_name: row.try_get("display_name")?,
            role: row.try_get("role")?,
            status: row.try_get("status")?,
            current_task_id: row.try_get("current_task_id")?,
            last_active_at: row.try_get("last_active_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const WORKER_COLUMNS: &str =
    "id, display_name, role, status, current_task_id, last_active_at, created_at, updated_at";

#[async_trait]
impl WorkerRepository for PostgresWorkerRepository {
    async fn create(&self, worker: &NewWorker) -> ConductorResult<Worker> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO workers (id, display_name, role, status, created_at, updated_at)
            VALUES ($1, $2, $3, 'idle', NOW(), NOW())
            RETURNING {WORKER_COLUMNS}
            "#
        ))
        .bind(&worker.id)
        .bind(&worker.display_name)
        .bind(&worker.role)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_worker(&row)
    }

    async fn find_by_id(&self, id: &str) -> ConductorResult<Option<Worker>> {
        let row = sqlx::query(&format!(
            "SELECT {WORKER_COLUMNS} FROM workers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_worker).transpose()
    }

    async fn list(&self) -> ConductorResult<Vec<Worker>> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKER_COLUMNS} FROM workers ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_worker).collect()
    }

    async fn list_idle(&self) -> ConductorResult<Vec<Worker>> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKER_COLUMNS} FROM workers WHERE status = 'idle' ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_worker).collect()
    }

    async fn list_working(&self) -> ConductorResult<Vec<Worker>> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKER_COLUMNS} FROM workers WHERE status = 'working' ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_worker).collect()
    }

    async fn set_status(&self, id: &str, status: WorkerStatus) -> ConductorResult<bool> {
        let result = sqlx::query("UPDATE workers SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn engage(&self, id: &str, task_id: Uuid) -> ConductorResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workers
            SET status = 'working', current_task_id = $2,
                last_active_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'idle'
            "#,
        )
        .bind(id)
        .bind(task_id)
        .execute(&self.pool)
        .await?;

        let engaged = result.rows_affected() > 0;
        debug!(worker_id = id, %task_id, engaged, "worker engage attempt");
        Ok(engaged)
    }

    async fn release(&self, id: &str, task_id: Uuid) -> ConductorResult<bool> {
        // The task guard keeps a worker that has since picked up different
        // work untouched.
        let result = sqlx::query(
            r#"
            UPDATE workers
            SET status = 'idle', current_task_id = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'working' AND current_task_id = $2
            "#,
        )
        .bind(id)
        .bind(task_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn force_idle(&self, id: &str) -> ConductorResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workers
            SET status = 'idle', current_task_id = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'working'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
