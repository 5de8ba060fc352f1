use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

use conductor_core::errors::{ConductorError, ConductorResult};

/// Schema every tenant is cloned from. Migrations keep its table definitions
/// current; provisioning copies structure, never data.
pub const TEMPLATE_SCHEMA: &str = "_template";

/// Tables cloned into each tenant schema.
const TENANT_TABLES: &[&str] = &["tasks", "workers", "messages", "activity_log"];

/// Namespace provisioning seam, kept narrow so the registry can be tested
/// without a live database.
#[async_trait]
pub trait SchemaManager: Send + Sync {
    /// Creates the schema and clones the template tables into it. The caller
    /// drops the schema again if any later provisioning step fails.
    async fn provision(&self, schema_name: &str) -> ConductorResult<()>;

    /// Drops a tenant schema and everything in it. Idempotent; dropping a
    /// schema that never finished provisioning is the rollback path.
    async fn drop_schema(&self, schema_name: &str) -> ConductorResult<()>;
}

/// Creates and drops per-tenant schemas.
///
/// Schema names end up inside DDL where bind parameters are unavailable, so
/// every name is validated against a restrictive charset before any
/// statement is built.
pub struct SchemaProvisioner {
    pool: PgPool,
}

impl SchemaProvisioner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Whether the schema exists, for diagnostics and tests.
    pub async fn schema_exists(&self, schema_name: &str) -> ConductorResult<bool> {
        validate_identifier(schema_name)?;

        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
        )
        .bind(schema_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }
}

#[async_trait]
impl SchemaManager for SchemaProvisioner {
    async fn provision(&self, schema_name: &str) -> ConductorResult<()> {
        validate_identifier(schema_name)?;

        sqlx::query(&format!(r#"CREATE SCHEMA "{schema_name}""#))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                ConductorError::infrastructure(format!(
                    "failed to create schema {schema_name}: {e}"
                ))
            })?;

        for table in TENANT_TABLES {
            sqlx::query(&format!(
                r#"CREATE TABLE "{schema_name}"."{table}" (LIKE "{TEMPLATE_SCHEMA}"."{table}" INCLUDING ALL)"#
            ))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                ConductorError::infrastructure(format!(
                    "failed to clone table {table} into {schema_name}: {e}"
                ))
            })?;
        }

        info!(schema = schema_name, "provisioned tenant schema");
        Ok(())
    }

    async fn drop_schema(&self, schema_name: &str) -> ConductorResult<()> {
        validate_identifier(schema_name)?;

        sqlx::query(&format!(r#"DROP SCHEMA IF EXISTS "{schema_name}" CASCADE"#))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                ConductorError::infrastructure(format!("failed to drop schema {schema_name}: {e}"))
            })?;

        warn!(schema = schema_name, "dropped tenant schema");
        Ok(())
    }
}

/// Postgres identifiers are capped at 63 bytes; the charset mirrors slug
/// validation with an extra allowance for the leading underscore the
/// template schema uses.
fn validate_identifier(name: &str) -> ConductorResult<()> {
    if name.is_empty() || name.len() > 63 {
        return Err(ConductorError::validation(format!(
            "invalid schema name length: '{name}'"
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('!');
    let valid = (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(ConductorError::validation(format!(
            "invalid schema name: '{name}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_accepts_tenant_names() {
        assert!(validate_identifier("tenant_blue_ocean").is_ok());
        assert!(validate_identifier("_template").is_ok());
        assert!(validate_identifier("tenant__123_co").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_injection() {
        assert!(validate_identifier("x\"; DROP SCHEMA public; --").is_err());
        assert!(validate_identifier("Tenant").is_err());
        assert!(validate_identifier("1tenant").is_err());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }
}
