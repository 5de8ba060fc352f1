use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{broadcast, RwLock, Semaphore};
use tracing::{debug, error, info, warn};

use conductor_core::config::SchedulerConfig;
use conductor_core::errors::{ConductorError, ConductorResult};
use conductor_core::events::{EventBus, SystemEvent};
use conductor_core::models::{Job, JobStatus};
use conductor_core::traits::JobControl;

use crate::cron_utils::CronSchedule;

/// One recurring unit of work. Handlers run concurrently with other jobs and
/// potentially with the same job fired from another process, so every
/// handler must rely on conditional updates rather than read-then-write
/// logic.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self) -> ConductorResult<()>;
}

struct JobEntry {
    job: Job,
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
    run_count: u64,
    last_error: Option<String>,
}

impl JobEntry {
    fn snapshot(&self) -> JobStatus {
        JobStatus {
            name: self.job.name.clone(),
            pattern: self.job.pattern.clone(),
            description: self.job.description.clone(),
            enabled: self.job.enabled,
            last_run: self.last_run,
            next_run: self.next_run,
            run_count: self.run_count,
            last_error: self.last_error.clone(),
        }
    }
}

/// Recurring job scheduler.
///
/// Owns the schedule and handler maps as instance state, dependency-injected
/// everywhere, so tests run isolated schedulers side by side. A semaphore
/// bounds how many handlers execute at once; run statistics are recorded
/// before each invocation so a crash mid-handler still shows the attempt.
pub struct JobScheduler {
    config: SchedulerConfig,
    jobs: Arc<RwLock<HashMap<String, JobEntry>>>,
    handlers: Arc<RwLock<HashMap<String, Arc<dyn JobHandler>>>>,
    events: Arc<dyn EventBus>,
    permits: Arc<Semaphore>,
}

impl JobScheduler {
    pub fn new(config: SchedulerConfig, events: Arc<dyn EventBus>) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Self {
            config,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(HashMap::new())),
            events,
            permits,
        }
    }

    /// Registers a job with its handler. Registering the same name again
    /// replaces the schedule in place and keeps the accumulated run
    /// statistics.
    pub async fn register(&self, job: Job, handler: Arc<dyn JobHandler>) {
        let next_run = Some(compute_next_run(&job.name, &job.pattern, Utc::now()));

        self.handlers
            .write()
            .await
            .insert(job.name.clone(), handler);

        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.name) {
            Some(entry) => {
                info!(job = %job.name, "re-registering job");
                entry.job = job;
                entry.next_run = next_run;
            }
            None => {
                info!(job = %job.name, pattern = %job.pattern, "registered job");
                jobs.insert(
                    job.name.clone(),
                    JobEntry {
                        job,
                        last_run: None,
                        next_run,
                        run_count: 0,
                        last_error: None,
                    },
                );
            }
        }
    }

    /// Removes a job from the schedule. The handler map is left untouched
    /// so an in-flight execution keeps its handler alive.
    pub async fn unregister(&self, name: &str) -> ConductorResult<()> {
        if self.jobs.write().await.remove(name).is_none() {
            return Err(ConductorError::job_not_found(name));
        }
        info!(job = name, "unregistered job");
        Ok(())
    }

    /// Runs due jobs. Called from the tick loop, public for tests.
    pub async fn tick(&self, now: DateTime<Utc>) {
        let due: Vec<String> = {
            let mut jobs = self.jobs.write().await;
            let mut due = Vec::new();
            for entry in jobs.values_mut() {
                let is_due = entry.job.enabled
                    && entry.next_run.map(|next| next <= now).unwrap_or(false);
                if is_due {
                    // Stats recorded before the handler runs.
                    entry.last_run = Some(now);
                    entry.run_count += 1;
                    entry.next_run =
                        Some(compute_next_run(&entry.job.name, &entry.job.pattern, now));
                    due.push(entry.job.name.clone());
                }
            }
            due
        };

        for name in due {
            let handler = self.handlers.read().await.get(&name).cloned();
            match handler {
                Some(handler) => self.spawn_job(name, handler),
                // Never throw from the tick path.
                None => warn!(job = %name, "no handler registered, skipping"),
            }
        }
    }

    fn spawn_job(&self, name: String, handler: Arc<dyn JobHandler>) {
        let permits = self.permits.clone();
        let jobs = self.jobs.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let started = Instant::now();
            debug!(job = %name, "job starting");

            match handler.run().await {
                Ok(()) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    debug!(job = %name, duration_ms, "job completed");
                    events.publish(SystemEvent::JobCompleted {
                        name: name.clone(),
                        duration_ms,
                    });
                }
                Err(e) => {
                    error!(job = %name, error = %e, retryable = e.is_retryable(), "job failed");
                    if let Some(entry) = jobs.write().await.get_mut(&name) {
                        entry.last_error = Some(e.to_string());
                    }
                    events.publish(SystemEvent::JobFailed {
                        name: name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        });
    }

    /// Tick loop. Runs until the shutdown channel fires.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(
            self.config.tick_interval_seconds,
        ));
        info!(
            tick_seconds = self.config.tick_interval_seconds,
            max_concurrent = self.config.max_concurrent_jobs,
            "job scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(Utc::now()).await;
                }
                _ = shutdown.recv() => {
                    info!("job scheduler stopping");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl JobControl for JobScheduler {
    async fn list_jobs(&self) -> Vec<JobStatus> {
        let jobs = self.jobs.read().await;
        let mut statuses: Vec<JobStatus> = jobs.values().map(JobEntry::snapshot).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    /// Runs the job inline, outside its schedule. Unlike the tick path the
    /// handler error propagates to the caller so retry policy stays with
    /// whoever triggered.
    async fn trigger(&self, name: &str) -> ConductorResult<()> {
        let handler = self
            .handlers
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ConductorError::job_not_found(name))?;

        {
            let mut jobs = self.jobs.write().await;
            let entry = jobs
                .get_mut(name)
                .ok_or_else(|| ConductorError::job_not_found(name))?;
            entry.last_run = Some(Utc::now());
            entry.run_count += 1;
        }

        let started = Instant::now();
        match handler.run().await {
            Ok(()) => {
                self.events.publish(SystemEvent::JobCompleted {
                    name: name.to_string(),
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                Ok(())
            }
            Err(e) => {
                if let Some(entry) = self.jobs.write().await.get_mut(name) {
                    entry.last_error = Some(e.to_string());
                }
                self.events.publish(SystemEvent::JobFailed {
                    name: name.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn pause(&self, name: &str) -> ConductorResult<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(name)
            .ok_or_else(|| ConductorError::job_not_found(name))?;
        entry.job.enabled = false;
        info!(job = name, "paused job");
        Ok(())
    }

    async fn resume(&self, name: &str) -> ConductorResult<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(name)
            .ok_or_else(|| ConductorError::job_not_found(name))?;
        entry.job.enabled = true;
        entry.next_run = Some(compute_next_run(
            &entry.job.name,
            &entry.job.pattern,
            Utc::now(),
        ));
        info!(job = name, "resumed job");
        Ok(())
    }
}

/// An unparseable pattern degrades to "run in a minute" instead of taking
/// the scheduler down; the fallback repeats on every recompute so the bad
/// pattern stays visible in the logs until fixed.
fn compute_next_run(name: &str, pattern: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    match CronSchedule::new(pattern) {
        Ok(schedule) => schedule
            .next_after(now)
            .unwrap_or_else(|| now + Duration::seconds(60)),
        Err(e) => {
            warn!(job = name, pattern, error = %e, "invalid cron pattern, falling back to 60s");
            now + Duration::seconds(60)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use conductor_testing_utils::MockEventBus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn run(&self) -> ConductorResult<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl JobHandler for FailingHandler {
        async fn run(&self) -> ConductorResult<()> {
            Err(ConductorError::infrastructure("handler exploded"))
        }
    }

    fn scheduler() -> (JobScheduler, MockEventBus) {
        let events = MockEventBus::new();
        let scheduler = JobScheduler::new(SchedulerConfig::default(), Arc::new(events.clone()));
        (scheduler, events)
    }

    fn counting() -> (Arc<dyn JobHandler>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (Arc::new(CountingHandler { runs: runs.clone() }), runs)
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let (scheduler, _) = scheduler();
        let (handler, _) = counting();

        scheduler
            .register(Job::new("sweep", "0 */5 * * * *"), handler.clone())
            .await;
        scheduler
            .register(Job::new("sweep", "0 */10 * * * *"), handler)
            .await;

        let jobs = scheduler.list_jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].pattern, "0 */10 * * * *");
    }

    #[tokio::test]
    async fn test_trigger_runs_handler_and_records_stats() {
        let (scheduler, events) = scheduler();
        let (handler, runs) = counting();
        scheduler
            .register(Job::new("sweep", "0 */5 * * * *"), handler)
            .await;

        scheduler.trigger("sweep").await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        let jobs = scheduler.list_jobs().await;
        assert_eq!(jobs[0].run_count, 1);
        assert!(jobs[0].last_run.is_some());
        assert!(matches!(
            events.published()[0],
            SystemEvent::JobCompleted { .. }
        ));
    }

    #[tokio::test]
    async fn test_trigger_unknown_job() {
        let (scheduler, _) = scheduler();
        let err = scheduler.trigger("ghost").await.unwrap_err();
        assert!(matches!(err, ConductorError::JobNotFound { .. }));
    }

    #[tokio::test]
    async fn test_failed_trigger_records_error_and_propagates() {
        let (scheduler, events) = scheduler();
        scheduler
            .register(Job::new("bad", "0 */5 * * * *"), Arc::new(FailingHandler))
            .await;

        let err = scheduler.trigger("bad").await.unwrap_err();
        assert!(matches!(err, ConductorError::Infrastructure(_)));

        let jobs = scheduler.list_jobs().await;
        assert!(jobs[0].last_error.as_deref().unwrap().contains("exploded"));
        assert!(matches!(
            events.published()[0],
            SystemEvent::JobFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_tick_runs_due_jobs_only() {
        let (scheduler, _) = scheduler();
        let (due_handler, due_runs) = counting();
        let (later_handler, later_runs) = counting();

        // every second vs. every five minutes
        scheduler
            .register(Job::new("due", "* * * * * *"), due_handler)
            .await;
        scheduler
            .register(Job::new("later", "0 */5 * * * *"), later_handler)
            .await;

        scheduler.tick(Utc::now() + Duration::seconds(2)).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(due_runs.load(Ordering::SeqCst), 1);
        let jobs = scheduler.list_jobs().await;
        let due = jobs.iter().find(|j| j.name == "due").unwrap();
        assert_eq!(due.run_count, 1);

        // five-minute job was not due two seconds in
        if Utc::now().second() < 55 {
            assert_eq!(later_runs.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_paused_job_does_not_fire() {
        let (scheduler, _) = scheduler();
        let (handler, runs) = counting();
        scheduler
            .register(Job::new("sweep", "* * * * * *"), handler)
            .await;
        scheduler.pause("sweep").await.unwrap();

        scheduler.tick(Utc::now() + Duration::seconds(2)).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!scheduler.list_jobs().await[0].enabled);
    }

    #[tokio::test]
    async fn test_resume_recomputes_next_run() {
        let (scheduler, _) = scheduler();
        let (handler, _) = counting();
        scheduler
            .register(Job::new("sweep", "0 */5 * * * *"), handler)
            .await;
        scheduler.pause("sweep").await.unwrap();
        scheduler.resume("sweep").await.unwrap();

        let jobs = scheduler.list_jobs().await;
        assert!(jobs[0].enabled);
        assert!(jobs[0].next_run.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_bad_pattern_falls_back_to_one_minute() {
        let (scheduler, _) = scheduler();
        let (handler, _) = counting();
        scheduler
            .register(Job::new("odd", "definitely not cron"), handler)
            .await;

        let jobs = scheduler.list_jobs().await;
        let next = jobs[0].next_run.unwrap();
        let delta = next - Utc::now();
        assert!(delta <= Duration::seconds(61));
        assert!(delta >= Duration::seconds(55));
    }

    #[tokio::test]
    async fn test_unregister_removes_schedule() {
        let (scheduler, _) = scheduler();
        let (handler, _) = counting();
        scheduler
            .register(Job::new("sweep", "0 */5 * * * *"), handler)
            .await;
        scheduler.unregister("sweep").await.unwrap();

        assert!(scheduler.list_jobs().await.is_empty());
        assert!(scheduler.unregister("sweep").await.is_err());
    }
}
