use async_trait::async_trait;
use feedwatch_core::Article;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpsertOutcome {
    Inserted,
    /// A row with the same URL already existed; nothing was written.
    AlreadyPresent,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invalid database configuration: {0}")]
    Config(String),
    #[error("connecting to database: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("acquiring pooled connection: {0}")]
    Pool(#[source] sqlx::Error),
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),
}

/// Article store keyed by URL.
///
/// Both operations may be called concurrently from many fetch tasks. The
/// existence check is only an optimization: two tasks can both see `false`
/// for the same URL, and it is `upsert` that guarantees a single row.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// `false` only when the URL is definitively absent. A failed lookup is
    /// reported as `true` so the article is left alone this cycle.
    async fn exists(&self, url: &str) -> bool;

    /// Insert the article unless a row with the same URL exists. A duplicate
    /// is a successful no-op, never an error.
    async fn upsert(&self, article: &Article) -> Result<UpsertOutcome, RepositoryError>;
}
