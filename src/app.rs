use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

use conductor_api::{create_routes, AppState};
use conductor_core::config::AppConfig;
use conductor_core::models::Job;
use conductor_core::traits::{TenantHandleProvider, TenantRepository, WorkflowRunner};
use conductor_core::EventBus;
use conductor_dispatcher::{
    AssignmentSweep, HeartbeatAuditor, InboxSweep, JobScheduler, LocalWorkflowRunner,
    RetentionSweep, StuckTaskReaper,
};
use conductor_infrastructure::{
    InMemoryEventBus, PostgresTenantRepository, SchemaProvisioner, TenantPoolManager,
    TenantRegistry,
};

#[derive(Debug, Clone)]
pub enum AppMode {
    /// Recurring jobs only.
    Scheduler,
    /// HTTP surface only.
    Api,
    /// Everything in one process.
    All,
}

pub struct Application {
    config: AppConfig,
    mode: AppMode,
    scheduler: Arc<JobScheduler>,
    registry: Arc<TenantRegistry>,
    handles: Arc<TenantPoolManager>,
}

impl Application {
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!(?mode, "initializing application");

        let pool = create_registry_pool(&config).await?;

        sqlx::migrate!()
            .run(&pool)
            .await
            .context("failed to run database migrations")?;

        let tenant_repo: Arc<dyn TenantRepository> =
            Arc::new(PostgresTenantRepository::new(pool.clone()));
        let events: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::default());

        let handles = Arc::new(TenantPoolManager::new(
            pool.clone(),
            tenant_repo.clone(),
            config.database.clone(),
        ));
        let registry = Arc::new(TenantRegistry::new(
            tenant_repo.clone(),
            Arc::new(SchemaProvisioner::new(pool)),
            handles.clone(),
            events.clone(),
        ));

        let scheduler = Arc::new(JobScheduler::new(config.scheduler.clone(), events.clone()));
        register_sweeps(&scheduler, &config, tenant_repo, handles.clone(), events).await;

        Ok(Self {
            config,
            mode,
            scheduler,
            registry,
            handles,
        })
    }

    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(mode = ?self.mode, "starting application");

        match self.mode {
            AppMode::Scheduler => {
                self.scheduler.run(shutdown_rx).await;
            }
            AppMode::Api => {
                self.run_api(shutdown_rx).await?;
            }
            AppMode::All => {
                let scheduler = self.scheduler.clone();
                let scheduler_rx = shutdown_rx.resubscribe();
                let scheduler_handle = tokio::spawn(async move {
                    scheduler.run(scheduler_rx).await;
                });

                self.run_api(shutdown_rx).await?;

                if let Err(e) = scheduler_handle.await {
                    error!(error = %e, "scheduler task panicked");
                }
            }
        }

        // All tenant pools drain on the way out.
        self.handles.disconnect_all().await;
        info!("application stopped");
        Ok(())
    }

    async fn run_api(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let state = AppState {
            jobs: self.scheduler.clone(),
            lifecycle: self.registry.clone(),
            handles: self.handles.clone(),
            config: self.config.api.clone(),
        };
        let router = create_routes(state);

        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("failed to bind {}", self.config.api.bind_address))?;
        info!(address = %self.config.api.bind_address, "api server listening");

        // Connect info feeds the caller address on tenant audit lines.
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .context("api server failed")?;

        info!("api server stopped");
        Ok(())
    }
}

async fn create_registry_pool(config: &AppConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(std::time::Duration::from_secs(
            config.database.connect_timeout_seconds,
        ))
        .connect(&config.database.url)
        .await
        .context("failed to connect to the registry database")
}

async fn register_sweeps(
    scheduler: &JobScheduler,
    config: &AppConfig,
    tenants: Arc<dyn TenantRepository>,
    handles: Arc<dyn TenantHandleProvider>,
    events: Arc<dyn EventBus>,
) {
    let runner: Arc<dyn WorkflowRunner> = Arc::new(LocalWorkflowRunner);
    let sweeps = &config.sweeps;

    scheduler
        .register(
            Job::new("assignment_sweep", &sweeps.assignment_pattern)
                .with_description("start pending tasks on idle workers"),
            Arc::new(AssignmentSweep::new(
                tenants.clone(),
                handles.clone(),
                runner,
                events.clone(),
            )),
        )
        .await;

    scheduler
        .register(
            Job::new("stuck_task_reaper", &sweeps.reaper_pattern)
                .with_description("block tasks stuck in progress"),
            Arc::new(StuckTaskReaper::new(
                tenants.clone(),
                handles.clone(),
                events.clone(),
                sweeps.stuck_timeout_minutes,
            )),
        )
        .await;

    scheduler
        .register(
            Job::new("heartbeat_auditor", &sweeps.auditor_pattern)
                .with_description("reset working workers with no task"),
            Arc::new(HeartbeatAuditor::new(
                tenants.clone(),
                handles.clone(),
                events,
            )),
        )
        .await;

    scheduler
        .register(
            Job::new("inbox_sweep", &sweeps.inbox_pattern)
                .with_description("surface unread messages as tasks"),
            Arc::new(InboxSweep::new(tenants.clone(), handles.clone())),
        )
        .await;

    scheduler
        .register(
            Job::new("retention_sweep", &sweeps.retention_pattern)
                .with_description("prune old tasks, messages and activity"),
            Arc::new(RetentionSweep::new(tenants, handles, sweeps)),
        )
        .await;
}
