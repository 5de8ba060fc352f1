use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use conductor_core::errors::{ConductorError, ConductorResult};
use conductor_core::models::{NewTenant, Tenant, TenantStatus};
use conductor_core::traits::TenantRepository;

/// Tenant store in the shared registry schema.
pub struct PostgresTenantRepository {
    pool: PgPool,
}

impl PostgresTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_tenant(row: &sqlx::postgres::PgRow) -> ConductorResult<Tenant> {
        Ok(Tenant {
            id: row.try_get("id")?,
            slug: row.try_get("slug")?,
            display_name: row.try_get("display_name")?,
            schema_name: row.try_get("schema_name")?,
            plan: row.try_get("plan")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

const TENANT_COLUMNS: &str =
    "id, slug, display_name, schema_name, plan, status, created_at, updated_at";

#[async_trait]
impl TenantRepository for PostgresTenantRepository {
    async fn create(&self, tenant: &NewTenant) -> ConductorResult<Tenant> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tenants (id, slug, display_name, schema_name, plan, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'provisioning', NOW(), NOW())
            RETURNING {TENANT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&tenant.slug)
        .bind(&tenant.display_name)
        .bind(format!("tenant_{}", tenant.slug))
        .bind(&tenant.plan)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ConductorError::conflict(format!("tenant slug already exists: {}", tenant.slug))
            }
            _ => ConductorError::Database(e),
        })?;

        debug!(slug = %tenant.slug, "inserted tenant row");
        Self::row_to_tenant(&row)
    }

    async fn find_by_slug(&self, slug: &str) -> ConductorResult<Option<Tenant>> {
        let row = sqlx::query(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_tenant).transpose()
    }

    async fn list_active(&self) -> ConductorResult<Vec<Tenant>> {
        let rows = sqlx::query(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE status = 'active' ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_tenant).collect()
    }

    async fn update_status(&self, id: Uuid, status: TenantStatus) -> ConductorResult<bool> {
        let result = sqlx::query("UPDATE tenants SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn rename(&self, slug: &str, display_name: &str) -> ConductorResult<bool> {
        let result =
            sqlx::query("UPDATE tenants SET display_name = $2, updated_at = NOW() WHERE slug = $1")
                .bind(slug)
                .bind(display_name)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, slug: &str) -> ConductorResult<bool> {
        let result = sqlx::query("DELETE FROM tenants WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await?;

        debug!(slug, "deleted tenant row");
        Ok(result.rows_affected() > 0)
    }
}
