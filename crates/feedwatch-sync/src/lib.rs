//! Feed polling: discover article links, fetch them concurrently, store new ones.

mod config;
mod crawler;
mod fetcher;
mod scheduler;

use std::sync::Arc;

use anyhow::{Context, Result};
use feedwatch_adapters::SiteAdapter;
use feedwatch_storage::{HttpSession, MemoryArticleRepository};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use config::{load_site_profile, ConfigError, SyncConfig, DEFAULT_POLL_INTERVAL};
pub use crawler::{CycleSummary, FeedCrawler, FeedError};
pub use fetcher::{ArticleFetcher, FetchError, FetchOutcome};
pub use scheduler::{
    Cycle, PollingCycle, Scheduler, SchedulerError, SchedulerReport, SchedulerState,
};

pub const CRATE_NAME: &str = "feedwatch-sync";

/// Run a single cycle with configuration from the environment. A dry run
/// stores into a throwaway in-memory repository instead of Postgres.
pub async fn run_once_from_env(dry_run: bool) -> Result<CycleSummary> {
    let config = SyncConfig::from_env().context("loading configuration")?;
    if dry_run {
        let adapter = SiteAdapter::new(config.site.clone()).context("compiling site profile")?;
        let session = HttpSession::new(config.http_client_config())?;
        let crawler = FeedCrawler::new(
            session,
            Arc::new(MemoryArticleRepository::new()),
            Arc::new(adapter),
        )
        .with_max_concurrent_fetches(config.max_concurrent_fetches);
        return Ok(crawler.crawl_once().await);
    }

    let cycle = PollingCycle::new(config)?;
    let summary = cycle.run_cycle(Uuid::new_v4()).await?;
    Ok(summary)
}

/// Poll until `shutdown` is cancelled.
pub async fn run_forever_from_env(shutdown: CancellationToken) -> Result<SchedulerReport> {
    let config = SyncConfig::from_env().context("loading configuration")?;
    let interval = config.poll_interval;
    let scheduler = Scheduler::new(PollingCycle::new(config)?, interval);
    Ok(scheduler.run(shutdown).await)
}
