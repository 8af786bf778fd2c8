use std::collections::HashMap;

use async_trait::async_trait;
use feedwatch_core::Article;
use tokio::sync::Mutex;

use crate::repository::{ArticleRepository, RepositoryError, UpsertOutcome};

/// Process-local repository with the same insert-if-absent semantics as the
/// PostgreSQL one. Backs `--dry-run` and the pipeline tests.
#[derive(Debug, Default)]
pub struct MemoryArticleRepository {
    rows: Mutex<HashMap<String, Article>>,
}

impl MemoryArticleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_articles(articles: impl IntoIterator<Item = Article>) -> Self {
        let rows = articles
            .into_iter()
            .map(|a| (a.url.clone(), a))
            .collect::<HashMap<_, _>>();
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    pub async fn get(&self, url: &str) -> Option<Article> {
        self.rows.lock().await.get(url).cloned()
    }

    pub async fn urls(&self) -> Vec<String> {
        let mut urls = self.rows.lock().await.keys().cloned().collect::<Vec<_>>();
        urls.sort();
        urls
    }
}

#[async_trait]
impl ArticleRepository for MemoryArticleRepository {
    async fn exists(&self, url: &str) -> bool {
        self.rows.lock().await.contains_key(url)
    }

    async fn upsert(&self, article: &Article) -> Result<UpsertOutcome, RepositoryError> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(&article.url) {
            return Ok(UpsertOutcome::AlreadyPresent);
        }
        rows.insert(article.url.clone(), article.clone());
        Ok(UpsertOutcome::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn article(url: &str, title: &str) -> Article {
        Article {
            title: title.to_string(),
            published_at: "2024-05-01, 12:00".to_string(),
            url: url.to_string(),
            author_name: "alice".to_string(),
            author_profile_url: "https://example.com/users/alice/".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_upsert_is_a_no_op_success() {
        let repo = MemoryArticleRepository::new();
        let first = repo.upsert(&article("https://example.com/1", "first")).await.unwrap();
        let second = repo.upsert(&article("https://example.com/1", "second")).await.unwrap();

        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::AlreadyPresent);
        assert_eq!(repo.len().await, 1);
        assert_eq!(repo.get("https://example.com/1").await.unwrap().title, "first");
    }

    #[tokio::test]
    async fn concurrent_duplicate_upserts_store_one_row() {
        let repo = Arc::new(MemoryArticleRepository::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let url = format!("https://example.com/{}", i % 4);
                repo.upsert(&article(&url, "t")).await.unwrap()
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() == UpsertOutcome::Inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 4);
        assert_eq!(repo.len().await, 4);
    }

    #[tokio::test]
    async fn exists_reflects_seeded_rows() {
        let repo = MemoryArticleRepository::with_articles([article("https://example.com/b", "b")]);
        assert!(repo.exists("https://example.com/b").await);
        assert!(!repo.exists("https://example.com/a").await);
        assert_eq!(repo.urls().await, vec!["https://example.com/b".to_string()]);
    }
}
