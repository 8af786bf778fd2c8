use std::time::Duration;

use async_trait::async_trait;
use feedwatch_core::Article;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::repository::{ArticleRepository, RepositoryError, UpsertOutcome};

/// Table layout. Column names match the deployment this tool replaced.
pub const ARTICLES_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id                BIGSERIAL PRIMARY KEY,
    title             TEXT NOT NULL,
    date              TEXT NOT NULL,
    article_url       TEXT NOT NULL UNIQUE,
    author_name       TEXT NOT NULL,
    user_profile_link TEXT NOT NULL
)
"#;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full connection URL. When set, the individual parts are ignored.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Upper bound on waiting for a pooled connection, including the first connect.
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "habr_articles".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> Result<PgConnectOptions, RepositoryError> {
        if let Some(url) = &self.url {
            return url
                .parse::<PgConnectOptions>()
                .map_err(|err| RepositoryError::Config(err.to_string()));
        }
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        Ok(options)
    }

    /// Connection target without credentials, for log lines.
    pub fn display_target(&self) -> String {
        match &self.url {
            Some(_) => "DATABASE_URL".to_string(),
            None => format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgArticleRepository {
    pool: PgPool,
}

impl PgArticleRepository {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, RepositoryError> {
        let options = config.connect_options()?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .min_connections(config.min_connections.min(config.max_connections.max(1)))
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(RepositoryError::Connect)?;
        info!(target_db = %config.display_target(), "database pool ready");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::Pool)?;
        sqlx::query(ARTICLES_TABLE_DDL)
            .execute(&mut *conn)
            .await
            .map_err(RepositoryError::Query)?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn lookup(&self, url: &str) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::Pool)?;
        let row = sqlx::query("SELECT 1 FROM articles WHERE article_url = $1 LIMIT 1")
            .bind(url)
            .fetch_optional(&mut *conn)
            .await
            .map_err(RepositoryError::Query)?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl ArticleRepository for PgArticleRepository {
    async fn exists(&self, url: &str) -> bool {
        match self.lookup(url).await {
            Ok(found) => found,
            Err(err) => {
                warn!(url, error = %err, "existence check failed; skipping article this cycle");
                true
            }
        }
    }

    async fn upsert(&self, article: &Article) -> Result<UpsertOutcome, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::Pool)?;
        let result = sqlx::query(
            r#"
            INSERT INTO articles (title, date, article_url, author_name, user_profile_link)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (article_url) DO NOTHING
            "#,
        )
        .bind(&article.title)
        .bind(&article.published_at)
        .bind(&article.url)
        .bind(&article.author_name)
        .bind(&article.author_profile_url)
        .execute(&mut *conn)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(UpsertOutcome::AlreadyPresent),
            Ok(_) => Ok(UpsertOutcome::Inserted),
            // A unique index other than the conflict target still means "already stored".
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Ok(UpsertOutcome::AlreadyPresent)
            }
            Err(err) => Err(RepositoryError::Query(err)),
        }
    }
}
