//! Article persistence + HTTP session utilities for feedwatch.

mod http;
mod memory;
mod postgres;
mod repository;

pub use http::{FetchedPage, HttpClientConfig, HttpError, HttpSession};
pub use memory::MemoryArticleRepository;
pub use postgres::{DatabaseConfig, PgArticleRepository, ARTICLES_TABLE_DDL};
pub use repository::{ArticleRepository, RepositoryError, UpsertOutcome};

pub const CRATE_NAME: &str = "feedwatch-storage";
