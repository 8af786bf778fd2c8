use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use feedwatch_adapters::{AdapterError, SiteAdapter};
use feedwatch_storage::{ArticleRepository, HttpSession, PgArticleRepository, RepositoryError};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::crawler::{CycleSummary, FeedCrawler};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("database unavailable: {0}")]
    Database(#[from] RepositoryError),
    #[error("building http session: {0}")]
    Session(#[source] anyhow::Error),
    #[error("invalid site profile: {0}")]
    Site(#[from] AdapterError),
    #[error("cycle task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// One polling round, including acquiring and releasing its resources.
#[async_trait]
pub trait Cycle: Send + Sync {
    async fn run_cycle(&self, cycle_id: Uuid) -> Result<CycleSummary, SchedulerError>;
}

/// Production cycle: fresh database pool and HTTP session per round.
pub struct PollingCycle {
    config: SyncConfig,
    adapter: Arc<SiteAdapter>,
}

impl PollingCycle {
    pub fn new(config: SyncConfig) -> Result<Self, SchedulerError> {
        let adapter = Arc::new(SiteAdapter::new(config.site.clone())?);
        Ok(Self { config, adapter })
    }
}

#[async_trait]
impl Cycle for PollingCycle {
    async fn run_cycle(&self, cycle_id: Uuid) -> Result<CycleSummary, SchedulerError> {
        let repo = Arc::new(PgArticleRepository::connect(&self.config.database).await?);
        if let Err(err) = repo.ensure_schema().await {
            repo.close().await;
            return Err(err.into());
        }
        let session = match HttpSession::new(self.config.http_client_config()) {
            Ok(session) => session,
            Err(err) => {
                repo.close().await;
                return Err(SchedulerError::Session(err));
            }
        };

        let repository: Arc<dyn ArticleRepository> = repo.clone();
        let crawler = FeedCrawler::new(session, repository, Arc::clone(&self.adapter))
            .with_max_concurrent_fetches(self.config.max_concurrent_fetches);
        let summary = crawler.crawl_cycle(cycle_id).await;

        repo.close().await;
        Ok(summary)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub cycles_started: u64,
    pub cycles_failed: u64,
}

/// Runs cycles back to back with a fixed delay in between. Shutdown is only
/// observed while idle; a running cycle always completes.
pub struct Scheduler<C> {
    cycle: Arc<C>,
    interval: Duration,
    state: watch::Sender<SchedulerState>,
}

impl<C: Cycle + 'static> Scheduler<C> {
    pub fn new(cycle: C, interval: Duration) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            cycle: Arc::new(cycle),
            interval,
            state,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub async fn run(&self, shutdown: CancellationToken) -> SchedulerReport {
        let mut report = SchedulerReport::default();
        info!(interval_secs = self.interval.as_secs(), "scheduler started");

        while !shutdown.is_cancelled() {
            self.state.send_replace(SchedulerState::Running);
            let cycle_id = Uuid::new_v4();
            report.cycles_started += 1;

            // Run on its own task so a panicking cycle is contained like any other failure.
            let cycle = Arc::clone(&self.cycle);
            let outcome = match tokio::spawn(async move { cycle.run_cycle(cycle_id).await }).await {
                Ok(result) => result,
                Err(join_err) => Err(SchedulerError::Aborted(join_err.to_string())),
            };
            match outcome {
                Ok(summary) => info!(
                    %cycle_id,
                    inserted = summary.inserted,
                    failed = summary.failed,
                    "cycle complete"
                ),
                Err(err) => {
                    report.cycles_failed += 1;
                    error!(%cycle_id, error = %err, "cycle failed; next attempt after the regular interval");
                }
            }

            self.state.send_replace(SchedulerState::Idle);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(
            cycles = report.cycles_started,
            failed = report.cycles_failed,
            "scheduler stopped"
        );
        report
    }
}
