use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use conductor_core::config::DatabaseConfig;
use conductor_core::errors::{ConductorError, ConductorResult};
use conductor_core::models::tenant::validate_slug;
use conductor_core::traits::{TenantHandle, TenantHandleProvider, TenantRepository};

use crate::database::postgres::{
    PostgresActivityLogRepository, PostgresMessageRepository, PostgresTaskRepository,
    PostgresWorkerRepository,
};

/// Builds and caches per-tenant connection pools, each pinned to the
/// tenant's schema via `search_path`.
///
/// Construction is expensive (a pool plus a connectivity probe), so handles
/// are cached per slug. Validation happens before caching: an unknown or
/// inactive tenant never acquires a live handle. The benign race where two
/// requests build the same handle concurrently is tolerated; last write
/// wins and the loser's pool is closed.
pub struct TenantPoolManager {
    registry_pool: PgPool,
    tenants: Arc<dyn TenantRepository>,
    config: DatabaseConfig,
    cache: RwLock<HashMap<String, CachedHandle>>,
}

struct CachedHandle {
    pool: PgPool,
    handle: TenantHandle,
}

impl TenantPoolManager {
    pub fn new(
        registry_pool: PgPool,
        tenants: Arc<dyn TenantRepository>,
        config: DatabaseConfig,
    ) -> Self {
        Self {
            registry_pool,
            tenants,
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn build_handle(&self, slug: &str) -> ConductorResult<CachedHandle> {
        let tenant = self
            .tenants
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| ConductorError::tenant_not_found(slug))?;

        if !tenant.is_active() {
            return Err(ConductorError::TenantInactive {
                slug: tenant.slug.clone(),
                status: tenant.status.to_string(),
            });
        }

        let options = self
            .config
            .url
            .parse::<PgConnectOptions>()?
            .options([("search_path", tenant.schema_name.as_str())]);

        let pool = PgPoolOptions::new()
            .max_connections(self.config.tenant_pool_size)
            .acquire_timeout(Duration::from_secs(self.config.connect_timeout_seconds))
            .connect_with(options)
            .await?;

        // Probe before caching; a handle that cannot reach its schema must
        // never be handed out.
        sqlx::query("SELECT 1").execute(&pool).await?;

        let handle = TenantHandle {
            tenant,
            tasks: Arc::new(PostgresTaskRepository::new(pool.clone())),
            workers: Arc::new(PostgresWorkerRepository::new(pool.clone())),
            messages: Arc::new(PostgresMessageRepository::new(pool.clone())),
            activity: Arc::new(PostgresActivityLogRepository::new(pool.clone())),
        };

        debug!(slug, "built tenant handle");
        Ok(CachedHandle { pool, handle })
    }
}

#[async_trait]
impl TenantHandleProvider for TenantPoolManager {
    async fn handle(&self, slug: &str) -> ConductorResult<TenantHandle> {
        validate_slug(slug)?;

        if let Some(cached) = self.cache.read().await.get(slug) {
            return Ok(cached.handle.clone());
        }

        let built = self.build_handle(slug).await?;
        let handle = built.handle.clone();

        let mut cache = self.cache.write().await;
        if let Some(previous) = cache.insert(slug.to_string(), built) {
            previous.pool.close().await;
        }

        Ok(handle)
    }

    async fn evict(&self, slug: &str) {
        let removed = self.cache.write().await.remove(slug);
        if let Some(cached) = removed {
            cached.pool.close().await;
            info!(slug, "evicted tenant handle");
        }
    }

    async fn disconnect_all(&self) {
        let mut cache = self.cache.write().await;
        for (slug, cached) in cache.drain() {
            cached.pool.close().await;
            debug!(slug, "closed tenant pool");
        }
        self.registry_pool.close().await;
        info!("closed all database pools");
    }

    async fn cached_slugs(&self) -> Vec<String> {
        self.cache.read().await.keys().cloned().collect()
    }
}
