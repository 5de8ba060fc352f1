use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ConductorError, ConductorResult};

/// An isolated organization inside one shared deployment. Each tenant owns a
/// dedicated Postgres schema named after its slug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tenant {
    pub id: Uuid,
    pub slug: String,
    pub display_name: String,
    pub schema_name: String,
    pub plan: String,
    pub status: TenantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status. Advances forward only, except when provisioning is
/// rolled back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Provisioning,
    Active,
    Suspended,
    Deleted,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Provisioning => "provisioning",
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<sqlx::Postgres> for TenantStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("VARCHAR")
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TenantStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        match s {
            "provisioning" => Ok(TenantStatus::Provisioning),
            "active" => Ok(TenantStatus::Active),
            "suspended" => Ok(TenantStatus::Suspended),
            "deleted" => Ok(TenantStatus::Deleted),
            _ => Err(format!("Invalid tenant status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for TenantStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

/// Creation payload. The schema name is always derived from the slug, never
/// supplied by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTenant {
    pub slug: String,
    pub display_name: String,
    pub plan: String,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }
}

/// Derives a URL-safe slug from a display name: lowercase, whitespace runs
/// become underscores, everything outside `[a-z0-9_]` is stripped, and a
/// leading digit gets an underscore prefix.
///
/// Rejects input that leaves no letters, since such a slug could never be
/// told apart from an id.
pub fn derive_slug(name: &str) -> ConductorResult<String> {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_space = false;
    for ch in name.trim().to_lowercase().chars() {
        if ch.is_whitespace() {
            if !last_was_space && !slug.is_empty() {
                slug.push('_');
            }
            last_was_space = true;
        } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            slug.push(ch);
            last_was_space = false;
        } else {
            last_was_space = false;
        }
    }
    let slug = slug.trim_end_matches('_').to_string();

    if !slug.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ConductorError::validation(format!(
            "cannot derive a slug from '{name}': no usable characters"
        )));
    }

    if slug.starts_with(|c: char| c.is_ascii_digit()) {
        Ok(format!("_{slug}"))
    } else {
        Ok(slug)
    }
}

/// Checks that a slug is safe to embed in a schema-qualified identifier.
pub fn validate_slug(slug: &str) -> ConductorResult<()> {
    let mut chars = slug.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_lowercase() || first == '_')
                && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConductorError::validation(format!(
            "invalid tenant slug: '{slug}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_slug_basic() {
        assert_eq!(derive_slug("Acme Corp!").unwrap(), "acme_corp");
        assert_eq!(derive_slug("Blue Ocean").unwrap(), "blue_ocean");
    }

    #[test]
    fn test_derive_slug_leading_digit() {
        assert_eq!(derive_slug("123 Co").unwrap(), "_123_co");
    }

    #[test]
    fn test_derive_slug_collapses_whitespace() {
        assert_eq!(derive_slug("  A   B  ").unwrap(), "a_b");
    }

    #[test]
    fn test_derive_slug_rejects_symbol_only() {
        assert!(derive_slug("!!!").is_err());
        assert!(derive_slug("123").is_err());
        assert!(derive_slug("").is_err());
    }

    #[test]
    fn test_validate_slug() {
        assert!(validate_slug("acme_corp").is_ok());
        assert!(validate_slug("_123_co").is_ok());
        assert!(validate_slug("Acme").is_err());
        assert!(validate_slug("acme;drop").is_err());
        assert!(validate_slug("1abc").is_err());
        assert!(validate_slug("").is_err());
    }
}
