use std::sync::Arc;

use feedwatch_adapters::SiteAdapter;
use feedwatch_storage::{ArticleRepository, HttpError, HttpSession, RepositoryError, UpsertOutcome};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FetchOutcome {
    /// The existence check found the URL; nothing was fetched.
    AlreadyPresent,
    Inserted,
    /// Fetched, but another task stored the same URL first.
    Duplicate,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http status {status} for {url}")]
    BadStatus { status: u16, url: String },
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("persisting article: {0}")]
    Persistence(#[from] RepositoryError),
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::HttpStatus { status, url } => Self::BadStatus { status, url },
            HttpError::Request(err) => Self::Network(err),
        }
    }
}

/// Fetches one article page and stores it. Cheap to clone; clones share the
/// HTTP session, repository and compiled selectors.
#[derive(Clone)]
pub struct ArticleFetcher {
    session: HttpSession,
    repository: Arc<dyn ArticleRepository>,
    adapter: Arc<SiteAdapter>,
}

impl ArticleFetcher {
    pub fn new(
        session: HttpSession,
        repository: Arc<dyn ArticleRepository>,
        adapter: Arc<SiteAdapter>,
    ) -> Self {
        Self {
            session,
            repository,
            adapter,
        }
    }

    pub fn session(&self) -> &HttpSession {
        &self.session
    }

    pub fn adapter(&self) -> &SiteAdapter {
        &self.adapter
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        if self.repository.exists(url).await {
            debug!(url, "already present");
            return Ok(FetchOutcome::AlreadyPresent);
        }

        let page = self.session.fetch_page(url).await?;
        let article = self.adapter.extract_from_html(&page.body, url);
        info!(
            url = %article.url,
            title = %article.title,
            published_at = %article.published_at,
            author = %article.author_name,
            author_profile = %article.author_profile_url,
            "article extracted"
        );

        match self.repository.upsert(&article).await? {
            UpsertOutcome::Inserted => Ok(FetchOutcome::Inserted),
            UpsertOutcome::AlreadyPresent => {
                debug!(url, "stored by a concurrent task");
                Ok(FetchOutcome::Duplicate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use feedwatch_adapters::SiteProfile;
    use feedwatch_core::{Article, DATE_NOT_FOUND};
    use feedwatch_storage::{HttpClientConfig, MemoryArticleRepository};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct UnavailableRepository;

    #[async_trait]
    impl ArticleRepository for UnavailableRepository {
        async fn exists(&self, _url: &str) -> bool {
            false
        }

        async fn upsert(&self, _article: &Article) -> Result<UpsertOutcome, RepositoryError> {
            Err(RepositoryError::Pool(sqlx::Error::PoolTimedOut))
        }
    }

    fn fetcher(server: &MockServer, repository: Arc<dyn ArticleRepository>) -> ArticleFetcher {
        let adapter = SiteAdapter::new(SiteProfile {
            base_url: server.uri(),
            ..Default::default()
        })
        .unwrap();
        ArticleFetcher::new(
            HttpSession::new(HttpClientConfig::default()).unwrap(),
            repository,
            Arc::new(adapter),
        )
    }

    #[tokio::test]
    async fn stores_article_without_time_element_with_date_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ru/articles/1/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<h1 class="tm-title_h1"><span>No date</span></h1>
                   <a class="tm-user-info__username">  bob </a>
                   <a class="tm-user-info__userpic" href="/ru/users/bob/">pic</a>"#,
            ))
            .mount(&server)
            .await;

        let repo = Arc::new(MemoryArticleRepository::new());
        let url = format!("{}/ru/articles/1/", server.uri());
        let outcome = fetcher(&server, repo.clone()).fetch(&url).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Inserted);
        let stored = repo.get(&url).await.unwrap();
        assert_eq!(stored.title, "No date");
        assert_eq!(stored.published_at, DATE_NOT_FOUND);
        assert_eq!(stored.author_name, "bob");
        assert_eq!(stored.author_profile_url, format!("{}/ru/users/bob/", server.uri()));
    }

    #[tokio::test]
    async fn existing_url_is_not_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let url = format!("{}/ru/articles/2/", server.uri());
        let repo = Arc::new(MemoryArticleRepository::with_articles([Article::placeholder(
            url.clone(),
        )]));
        let outcome = fetcher(&server, repo).fetch(&url).await.unwrap();
        assert_eq!(outcome, FetchOutcome::AlreadyPresent);
    }

    #[tokio::test]
    async fn non_success_status_is_a_bad_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let repo = Arc::new(MemoryArticleRepository::new());
        let url = format!("{}/ru/articles/3/", server.uri());
        let err = fetcher(&server, repo.clone()).fetch(&url).await.unwrap_err();

        assert!(matches!(err, FetchError::BadStatus { status: 500, .. }));
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn repository_failure_is_a_persistence_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let url = format!("{}/ru/articles/4/", server.uri());
        let err = fetcher(&server, Arc::new(UnavailableRepository))
            .fetch(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Persistence(RepositoryError::Pool(_))));
    }

    #[tokio::test]
    async fn losing_the_insert_race_reports_duplicate() {
        struct StaleCheckRepository(MemoryArticleRepository);

        #[async_trait]
        impl ArticleRepository for StaleCheckRepository {
            async fn exists(&self, _url: &str) -> bool {
                false
            }

            async fn upsert(&self, article: &Article) -> Result<UpsertOutcome, RepositoryError> {
                self.0.upsert(article).await
            }
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let url = format!("{}/ru/articles/5/", server.uri());
        let repo = StaleCheckRepository(MemoryArticleRepository::with_articles([
            Article::placeholder(url.clone()),
        ]));
        let outcome = fetcher(&server, Arc::new(repo)).fetch(&url).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Duplicate);
    }
}
