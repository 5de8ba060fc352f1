use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use conductor_core::errors::ConductorResult;
use conductor_core::models::{Message, NewMessage};
use conductor_core::traits::MessageRepository;

/// Message store scoped to one tenant schema.
pub struct PostgresMessageRepository {
    pool: PgPool,
}

impl PostgresMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_message(row: &sqlx::postgres::PgRow) -> ConductorResult<Message> {
        Ok(Message {
            id: row.try_get("id")?,
            sender: row.try_get("sender")?,
            recipient_id: row.try_get("recipient_id")?,
            subject: row.try_get("subject")?,
            body: row.try_get("body")?,
            read: row.try_get("read")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

const MESSAGE_COLUMNS: &str = "id, sender, recipient_id, subject, body, read, created_at";

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn create(&self, message: &NewMessage) -> ConductorResult<Message> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO messages (id, sender, recipient_id, subject, body, read, created_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, NOW())
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&message.sender)
        .bind(&message.recipient_id)
        .bind(&message.subject)
        .bind(&message.body)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_message(&row)
    }

    async fn unread_for(&self, recipient_id: &str) -> ConductorResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE recipient_id = $1 AND read = FALSE
            ORDER BY created_at ASC
            "#
        ))
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn count_unread(&self, recipient_id: &str) -> ConductorResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM messages WHERE recipient_id = $1 AND read = FALSE",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("count")?)
    }

    async fn mark_read(&self, ids: &[Uuid]) -> ConductorResult<u64> {
        let result = sqlx::query("UPDATE messages SET read = TRUE WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_read_before(&self, cutoff: DateTime<Utc>) -> ConductorResult<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE read = TRUE AND created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
