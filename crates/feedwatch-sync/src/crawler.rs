use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use feedwatch_adapters::SiteAdapter;
use feedwatch_core::Lookup;
use feedwatch_storage::{ArticleRepository, HttpError, HttpSession};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::fetcher::{ArticleFetcher, FetchOutcome};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed returned http status {status} ({url})")]
    BadStatus { status: u16, url: String },
    #[error("fetching feed: {0}")]
    Network(#[source] reqwest::Error),
}

impl From<HttpError> for FeedError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::HttpStatus { status, url } => Self::BadStatus { status, url },
            HttpError::Request(err) => Self::Network(err),
        }
    }
}

/// What one cycle did. Reported after every started fetch has finished.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub feed_ok: bool,
    pub discovered: usize,
    pub links_missing: usize,
    pub already_present: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// Articles whose fetch failed or whose task panicked, sorted.
    pub failed_urls: Vec<String>,
}

impl CycleSummary {
    fn started(cycle_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            cycle_id,
            started_at: now,
            finished_at: now,
            feed_ok: false,
            discovered: 0,
            links_missing: 0,
            already_present: 0,
            inserted: 0,
            duplicates: 0,
            failed: 0,
            failed_urls: Vec::new(),
        }
    }

    fn record_failure(&mut self, url: String) {
        self.failed += 1;
        self.failed_urls.push(url);
    }

    fn record(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::AlreadyPresent => self.already_present += 1,
            FetchOutcome::Inserted => self.inserted += 1,
            FetchOutcome::Duplicate => self.duplicates += 1,
        }
    }

    /// Number of fetch tasks that reached a terminal state.
    pub fn attempted(&self) -> usize {
        self.already_present + self.inserted + self.duplicates + self.failed
    }
}

pub struct FeedCrawler {
    fetcher: ArticleFetcher,
    fetch_limit: Option<Arc<Semaphore>>,
}

impl FeedCrawler {
    pub fn new(
        session: HttpSession,
        repository: Arc<dyn ArticleRepository>,
        adapter: Arc<SiteAdapter>,
    ) -> Self {
        Self {
            fetcher: ArticleFetcher::new(session, repository, adapter),
            fetch_limit: None,
        }
    }

    /// Bound the number of article fetches in flight. `None` leaves the
    /// fan-out unbounded.
    pub fn with_max_concurrent_fetches(mut self, limit: Option<usize>) -> Self {
        self.fetch_limit = limit.map(|n| Arc::new(Semaphore::new(n.max(1))));
        self
    }

    pub async fn crawl_once(&self) -> CycleSummary {
        self.crawl_cycle(Uuid::new_v4()).await
    }

    /// Fetch the feed and every article it links to. Returns only once each
    /// started fetch task has succeeded or failed.
    pub async fn crawl_cycle(&self, cycle_id: Uuid) -> CycleSummary {
        let span = info_span!("crawl_cycle", %cycle_id);
        async move {
            let mut summary = CycleSummary::started(cycle_id);
            let feed_url = self.fetcher.adapter().feed_url().to_string();

            let links = match self.discover(&feed_url).await {
                Ok(links) => links,
                Err(err) => {
                    error!(url = %feed_url, error = %err, "feed fetch failed; nothing to do this cycle");
                    summary.finished_at = Utc::now();
                    return summary;
                }
            };
            summary.feed_ok = true;

            let mut urls = Vec::with_capacity(links.len());
            for (position, link) in links.into_iter().enumerate() {
                match link {
                    Lookup::Present(url) => urls.push(url),
                    Lookup::Absent => {
                        warn!(position, "link not found in feed item; skipping");
                        summary.links_missing += 1;
                    }
                }
            }
            summary.discovered = urls.len();
            info!(discovered = urls.len(), missing = summary.links_missing, "feed parsed");

            let mut tasks = JoinSet::new();
            let mut task_urls = HashMap::with_capacity(urls.len());
            for url in urls {
                let fetcher = self.fetcher.clone();
                let limit = self.fetch_limit.clone();
                let task_span = info_span!("article_fetch", url = %url);
                let task_url = url.clone();
                let handle = tasks.spawn(
                    async move {
                        let _permit = match limit {
                            Some(sem) => sem.acquire_owned().await.ok(),
                            None => None,
                        };
                        let result = fetcher.fetch(&url).await;
                        (url, result)
                    }
                    .instrument(task_span),
                );
                task_urls.insert(handle.id(), task_url);
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((_, Ok(outcome))) => summary.record(outcome),
                    Ok((url, Err(err))) => {
                        error!(url = %url, error = %err, "article fetch failed");
                        summary.record_failure(url);
                    }
                    Err(err) => {
                        let url = task_urls.remove(&err.id()).unwrap_or_default();
                        error!(url = %url, error = %err, "article task aborted");
                        summary.record_failure(url);
                    }
                }
            }

            summary.failed_urls.sort();
            summary.finished_at = Utc::now();
            info!(
                inserted = summary.inserted,
                already_present = summary.already_present,
                duplicates = summary.duplicates,
                failed = summary.failed,
                "cycle finished"
            );
            summary
        }
        .instrument(span)
        .await
    }

    async fn discover(&self, feed_url: &str) -> Result<Vec<Lookup>, FeedError> {
        let page = self.fetcher.session().fetch_page(feed_url).await?;
        Ok(self.fetcher.adapter().feed_links_from_html(&page.body))
    }
}
