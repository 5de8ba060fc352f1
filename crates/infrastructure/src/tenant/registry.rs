use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use conductor_core::errors::{ConductorError, ConductorResult};
use conductor_core::events::{EventBus, SystemEvent};
use conductor_core::models::{derive_slug, NewTenant, Tenant, TenantStatus};
use conductor_core::traits::{TenantHandleProvider, TenantLifecycle, TenantRepository};

use crate::database::provisioner::SchemaManager;
use crate::seed::seed_tenant;

/// Tenant lifecycle service.
///
/// Creation spans three resources with no common transaction: the registry
/// row, the tenant schema, and the seeded domain data. Each step that fails
/// unwinds everything done before it, so a tenant either exists completely
/// or not at all.
pub struct TenantRegistry {
    tenants: Arc<dyn TenantRepository>,
    schemas: Arc<dyn SchemaManager>,
    handles: Arc<dyn TenantHandleProvider>,
    events: Arc<dyn EventBus>,
}

impl TenantRegistry {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        schemas: Arc<dyn SchemaManager>,
        handles: Arc<dyn TenantHandleProvider>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            tenants,
            schemas,
            handles,
            events,
        }
    }

    async fn rollback_row(&self, slug: &str) {
        if let Err(e) = self.tenants.delete(slug).await {
            error!(slug, error = %e, "rollback failed to delete tenant row");
        }
    }

    async fn rollback_schema(&self, schema_name: &str) {
        if let Err(e) = self.schemas.drop_schema(schema_name).await {
            error!(schema = schema_name, error = %e, "rollback failed to drop schema");
        }
    }
}

#[async_trait]
impl TenantLifecycle for TenantRegistry {
    async fn create_tenant(&self, display_name: &str) -> ConductorResult<Tenant> {
        let slug = derive_slug(display_name)?;

        if self.tenants.find_by_slug(&slug).await?.is_some() {
            return Err(ConductorError::conflict(format!(
                "tenant slug already exists: {slug}"
            )));
        }

        let tenant = self
            .tenants
            .create(&NewTenant {
                slug: slug.clone(),
                display_name: display_name.to_string(),
                plan: "free".to_string(),
            })
            .await?;

        if let Err(e) = self.schemas.provision(&tenant.schema_name).await {
            warn!(slug, error = %e, "schema provisioning failed, rolling back");
            self.rollback_row(&slug).await;
            return Err(e);
        }

        if let Err(e) = self
            .tenants
            .update_status(tenant.id, TenantStatus::Active)
            .await
            .and_then(|updated| {
                if updated {
                    Ok(())
                } else {
                    Err(ConductorError::tenant_not_found(slug.clone()))
                }
            })
        {
            warn!(slug, error = %e, "activation failed, rolling back");
            self.rollback_schema(&tenant.schema_name).await;
            self.rollback_row(&slug).await;
            return Err(e);
        }

        // Seeding needs a live handle, which requires the active status set
        // just above.
        let seed_result = match self.handles.handle(&slug).await {
            Ok(handle) => seed_tenant(&handle).await,
            Err(e) => Err(e),
        };
        if let Err(e) = seed_result {
            warn!(slug, error = %e, "seeding failed, rolling back");
            self.handles.evict(&slug).await;
            self.rollback_schema(&tenant.schema_name).await;
            self.rollback_row(&slug).await;
            return Err(e);
        }

        let created = self
            .tenants
            .find_by_slug(&slug)
            .await?
            .ok_or_else(|| ConductorError::tenant_not_found(slug.clone()))?;

        self.events.publish(SystemEvent::TenantLifecycle {
            slug: slug.clone(),
            status: TenantStatus::Active,
        });
        info!(slug, "tenant created");
        Ok(created)
    }

    async fn list_tenants(&self) -> ConductorResult<Vec<Tenant>> {
        self.tenants.list_active().await
    }

    async fn rename_tenant(&self, slug: &str, display_name: &str) -> ConductorResult<Tenant> {
        if display_name.trim().is_empty() {
            return Err(ConductorError::validation("display name cannot be empty"));
        }

        if !self.tenants.rename(slug, display_name).await? {
            return Err(ConductorError::tenant_not_found(slug));
        }

        self.tenants
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| ConductorError::tenant_not_found(slug))
    }

    async fn delete_tenant(&self, slug: &str) -> ConductorResult<()> {
        let tenant = self
            .tenants
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| ConductorError::tenant_not_found(slug))?;

        // Only an active tenant can have workers mid-task.
        if tenant.is_active() {
            let handle = self.handles.handle(slug).await?;
            let working = handle.workers.list_working().await?;
            if !working.is_empty() {
                let names: Vec<String> = working.into_iter().map(|w| w.id).collect();
                return Err(ConductorError::state(format!(
                    "cannot delete tenant '{slug}' while workers are busy: {}",
                    names.join(", ")
                )));
            }
        }

        // Evict before dropping the schema; a live handle must never
        // outlive its namespace.
        self.handles.evict(slug).await;
        self.schemas.drop_schema(&tenant.schema_name).await?;
        self.tenants.delete(slug).await?;

        self.events.publish(SystemEvent::TenantLifecycle {
            slug: slug.to_string(),
            status: TenantStatus::Deleted,
        });
        info!(slug, "tenant deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::models::WorkerStatus;
    use conductor_testing_utils::{
        mock_tenant_handle, MockActivityLogRepository, MockEventBus, MockHandleProvider,
        MockMessageRepository, MockTaskRepository, MockTenantRepository, MockWorkerRepository,
        TenantBuilder, WorkerBuilder,
    };
    use std::sync::Mutex;

    /// Records provisioning calls; optionally fails provision.
    #[derive(Default)]
    struct FakeSchemaManager {
        provisioned: Mutex<Vec<String>>,
        dropped: Mutex<Vec<String>>,
        fail_provision: bool,
    }

    #[async_trait]
    impl SchemaManager for FakeSchemaManager {
        async fn provision(&self, schema_name: &str) -> ConductorResult<()> {
            if self.fail_provision {
                return Err(ConductorError::infrastructure("disk full"));
            }
            self.provisioned.lock().unwrap().push(schema_name.to_string());
            Ok(())
        }

        async fn drop_schema(&self, schema_name: &str) -> ConductorResult<()> {
            self.dropped.lock().unwrap().push(schema_name.to_string());
            Ok(())
        }
    }

    struct Fixture {
        tenants: MockTenantRepository,
        schemas: Arc<FakeSchemaManager>,
        handles: MockHandleProvider,
        events: MockEventBus,
        registry: TenantRegistry,
    }

    fn fixture(schemas: FakeSchemaManager) -> Fixture {
        let tenants = MockTenantRepository::new();
        let schemas = Arc::new(schemas);
        let handles = MockHandleProvider::new();
        let events = MockEventBus::new();
        let registry = TenantRegistry::new(
            Arc::new(tenants.clone()),
            schemas.clone(),
            Arc::new(handles.clone()),
            Arc::new(events.clone()),
        );
        Fixture {
            tenants,
            schemas,
            handles,
            events,
            registry,
        }
    }

    fn stage_handle(f: &Fixture, slug: &str) -> MockWorkerRepository {
        let workers = MockWorkerRepository::new();
        let handle = mock_tenant_handle(
            TenantBuilder::new().with_slug(slug).build(),
            &MockTaskRepository::new(),
            &workers,
            &MockMessageRepository::new(),
            &MockActivityLogRepository::new(),
        );
        f.handles.insert(slug, handle);
        workers
    }

    #[tokio::test]
    async fn test_create_tenant_end_to_end() {
        let f = fixture(FakeSchemaManager::default());
        let workers = stage_handle(&f, "blue_ocean");

        let tenant = f.registry.create_tenant("Blue Ocean").await.unwrap();

        assert_eq!(tenant.slug, "blue_ocean");
        assert_eq!(tenant.status, TenantStatus::Active);
        assert_eq!(
            f.schemas.provisioned.lock().unwrap().as_slice(),
            ["tenant_blue_ocean"]
        );
        // Seed ran against the staged handle.
        assert!(workers.get("ceo").is_some());
        assert_eq!(f.events.published_count(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_slug() {
        let f = fixture(FakeSchemaManager::default());
        stage_handle(&f, "acme_corp");

        f.registry.create_tenant("Acme Corp!").await.unwrap();
        let err = f.registry.create_tenant("Acme Corp").await.unwrap_err();
        assert!(matches!(err, ConductorError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_symbol_only_name() {
        let f = fixture(FakeSchemaManager::default());
        let err = f.registry.create_tenant("!!!").await.unwrap_err();
        assert!(matches!(err, ConductorError::Validation(_)));
        assert!(f.tenants.all().is_empty());
    }

    #[tokio::test]
    async fn test_provision_failure_removes_row() {
        let f = fixture(FakeSchemaManager {
            fail_provision: true,
            ..Default::default()
        });

        let err = f.registry.create_tenant("Blue Ocean").await.unwrap_err();
        assert!(matches!(err, ConductorError::Infrastructure(_)));
        assert!(f.tenants.all().is_empty());
    }

    #[tokio::test]
    async fn test_seed_failure_rolls_back_schema_and_row() {
        let f = fixture(FakeSchemaManager::default());
        // Pre-seeding the staged handle with a `ceo` worker makes the seed
        // step fail on the duplicate id.
        let workers = stage_handle(&f, "blue_ocean");
        workers.insert(WorkerBuilder::new().with_id("ceo").build());

        let err = f.registry.create_tenant("Blue Ocean").await.unwrap_err();
        assert!(matches!(err, ConductorError::Conflict(_)));
        assert!(f.tenants.all().is_empty());
        assert_eq!(
            f.schemas.dropped.lock().unwrap().as_slice(),
            ["tenant_blue_ocean"]
        );
        assert!(f.handles.evicted().contains(&"blue_ocean".to_string()));
    }

    #[tokio::test]
    async fn test_delete_refused_while_workers_busy() {
        let f = fixture(FakeSchemaManager::default());
        let workers = stage_handle(&f, "blue_ocean");
        f.registry.create_tenant("Blue Ocean").await.unwrap();

        let mut busy = workers.get("ceo").unwrap();
        busy.status = WorkerStatus::Working;
        workers.insert(busy);

        let err = f.registry.delete_tenant("blue_ocean").await.unwrap_err();
        match err {
            ConductorError::State(msg) => assert!(msg.contains("ceo")),
            other => panic!("expected State error, got {other:?}"),
        }
        assert_eq!(f.tenants.all().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_evicts_handle_before_dropping_schema() {
        let f = fixture(FakeSchemaManager::default());
        stage_handle(&f, "blue_ocean");
        f.registry.create_tenant("Blue Ocean").await.unwrap();

        f.registry.delete_tenant("blue_ocean").await.unwrap();

        assert!(f.tenants.all().is_empty());
        assert!(f.handles.evicted().contains(&"blue_ocean".to_string()));
        assert_eq!(
            f.schemas.dropped.lock().unwrap().as_slice(),
            ["tenant_blue_ocean"]
        );
        // Handle lookups now fail as not-found.
        assert!(f.handles.handle("blue_ocean").await.is_err());
    }

    #[tokio::test]
    async fn test_rename_unknown_tenant() {
        let f = fixture(FakeSchemaManager::default());
        let err = f
            .registry
            .rename_tenant("ghost", "Ghost Inc")
            .await
            .unwrap_err();
        assert!(matches!(err, ConductorError::TenantNotFound { .. }));
    }
}
