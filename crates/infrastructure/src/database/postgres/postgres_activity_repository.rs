use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use conductor_core::errors::ConductorResult;
use conductor_core::models::{ActivityEntry, NewActivityEntry};
use conductor_core::traits::ActivityLogRepository;

/// Audit log scoped to one tenant schema.
pub struct PostgresActivityLogRepository {
    pool: PgPool,
}

impl PostgresActivityLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_entry(row: &sqlx::postgres::PgRow) -> ConductorResult<ActivityEntry> {
        Ok(ActivityEntry {
            id: row.try_get("id")?,
            actor: row.try_get("actor")?,
            action: row.try_get("action")?,
            detail: row.try_get("detail")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ActivityLogRepository for PostgresActivityLogRepository {
    async fn record(&self, entry: &NewActivityEntry) -> ConductorResult<ActivityEntry> {
        let row = sqlx::query(
            r#"
            INSERT INTO activity_log (id, actor, action, detail, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, actor, action, detail, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&entry.actor)
        .bind(&entry.action)
        .bind(&entry.detail)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_entry(&row)
    }

    async fn recent(&self, limit: i64) -> ConductorResult<Vec<ActivityEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, actor, action, detail, created_at FROM activity_log
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> ConductorResult<u64> {
        let result = sqlx::query("DELETE FROM activity_log WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
