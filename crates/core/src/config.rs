use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub sweeps: SweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
    /// Pool size for each cached tenant handle. Tenant traffic is far
    /// lighter than registry traffic, so this stays small.
    pub tenant_pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/conductor".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_seconds: 30,
            tenant_pool_size: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub bind_address: String,
    pub cors_enabled: bool,
    /// Base domain used for subdomain tenant resolution, e.g. a request to
    /// `acme.conductor.dev` resolves tenant `acme` when this is
    /// `conductor.dev`.
    pub base_domain: String,
    /// Subdomains that never name a tenant.
    pub reserved_subdomains: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            cors_enabled: true,
            base_domain: "localhost".to_string(),
            reserved_subdomains: vec![
                "www".to_string(),
                "api".to_string(),
                "app".to_string(),
                "admin".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// How often the tick loop checks for due jobs.
    pub tick_interval_seconds: u64,
    /// Upper bound on handlers running at once.
    pub max_concurrent_jobs: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_seconds: 10,
            max_concurrent_jobs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub assignment_pattern: String,
    pub reaper_pattern: String,
    pub auditor_pattern: String,
    pub inbox_pattern: String,
    pub retention_pattern: String,
    /// Minutes an `in_progress` task may run before the reaper blocks it.
    pub stuck_timeout_minutes: i64,
    /// Days finished tasks are kept before retention deletes them.
    pub task_retention_days: i64,
    /// Days read messages are kept.
    pub message_retention_days: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            assignment_pattern: "0 */5 * * * *".to_string(),
            reaper_pattern: "0 */15 * * * *".to_string(),
            auditor_pattern: "0 */10 * * * *".to_string(),
            inbox_pattern: "0 */5 * * * *".to_string(),
            retention_pattern: "0 0 3 * * *".to_string(),
            stuck_timeout_minutes: 30,
            task_retention_days: 30,
            message_retention_days: 60,
        }
    }
}

impl AppConfig {
    /// Loads configuration from an optional TOML file, then applies
    /// `CONDUCTOR_*` environment overrides (`CONDUCTOR_DATABASE__URL` etc).
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        match config_path {
            Some(path) => {
                if !Path::new(path).exists() {
                    anyhow::bail!("config file not found: {path}");
                }
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
            None => {
                for path in ["config/conductor.toml", "conductor.toml"] {
                    if Path::new(path).exists() {
                        builder = builder.add_source(File::new(path, FileFormat::Toml));
                        break;
                    }
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("CONDUCTOR")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.scheduler.max_concurrent_jobs, 5);
        assert_eq!(config.sweeps.stuck_timeout_minutes, 30);
        assert!(config.api.reserved_subdomains.contains(&"www".to_string()));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[database]
url = "postgresql://db.internal/conductor"
max_connections = 20
min_connections = 2
connect_timeout_seconds = 10
tenant_pool_size = 5

[scheduler]
enabled = true
tick_interval_seconds = 5
max_concurrent_jobs = 8
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.scheduler.max_concurrent_jobs, 8);
        // Untouched sections fall back to defaults.
        assert_eq!(config.sweeps.task_retention_days, 30);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(AppConfig::load(Some("/nonexistent/conductor.toml")).is_err());
    }
}
