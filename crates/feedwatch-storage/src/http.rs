use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct HttpClientConfig {
    /// Per-request timeout. `None` waits for the remote side indefinitely.
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub body: String,
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

/// Shared HTTP session. Cloning is cheap and every clone draws from the same
/// connection pool, so one session can serve all fetch tasks of a cycle.
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: reqwest::Client,
}

impl HttpSession {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().gzip(true).brotli(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    /// GET `url`, reject non-2xx statuses, then read the body as text.
    ///
    /// The status is checked before the body is read; a failure while reading
    /// the body surfaces as [`HttpError::Request`].
    pub async fn fetch_page(&self, url: &str) -> Result<FetchedPage, HttpError> {
        debug!(url, "http get");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();

        if !status.is_success() {
            return Err(HttpError::HttpStatus {
                status: status.as_u16(),
                url: resp.url().to_string(),
            });
        }

        let body = resp.text().await?;
        Ok(FetchedPage { body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_page_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed/"))
            .and(header("user-agent", "feedwatch-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let session = HttpSession::new(HttpClientConfig {
            user_agent: Some("feedwatch-test".to_string()),
            ..Default::default()
        })
        .unwrap();
        let page = session
            .fetch_page(&format!("{}/feed/", server.uri()))
            .await
            .unwrap();

        assert_eq!(page.body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let session = HttpSession::new(HttpClientConfig::default()).unwrap();
        let err = session
            .fetch_page(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();

        match err {
            HttpError::HttpStatus { status, url } => {
                assert_eq!(status, 404);
                assert!(url.ends_with("/missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_host_is_a_request_error() {
        let session = HttpSession::new(HttpClientConfig {
            timeout: Some(Duration::from_secs(2)),
            ..Default::default()
        })
        .unwrap();
        let err = session.fetch_page("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, HttpError::Request(_)));
    }
}
