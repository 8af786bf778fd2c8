//! Core domain model for feedwatch: the persisted article and its field sentinels.

use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "feedwatch-core";

pub const TITLE_NOT_FOUND: &str = "title not found";
pub const DATE_NOT_FOUND: &str = "date not found";
pub const ANONYMOUS_AUTHOR: &str = "anonymous";
pub const PROFILE_NOT_FOUND: &str = "profile not found";

/// Result of looking up one optional field in a scraped document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Lookup {
    Present(String),
    #[default]
    Absent,
}

impl Lookup {
    pub fn from_option(value: Option<String>) -> Self {
        match value {
            Some(value) => Self::Present(value),
            None => Self::Absent,
        }
    }

    /// Resolve the lookup, substituting `sentinel` when nothing was found.
    pub fn or_sentinel(self, sentinel: &str) -> String {
        match self {
            Self::Present(value) => value,
            Self::Absent => sentinel.to_string(),
        }
    }
}

impl From<Option<String>> for Lookup {
    fn from(value: Option<String>) -> Self {
        Self::from_option(value)
    }
}

/// One article as stored. Every field is always populated; missing source data
/// is represented by the per-field sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub published_at: String,
    pub url: String,
    pub author_name: String,
    pub author_profile_url: String,
}

impl Article {
    /// Article for `url` with every extracted field set to its sentinel.
    pub fn placeholder(url: impl Into<String>) -> Self {
        Self {
            title: TITLE_NOT_FOUND.to_string(),
            published_at: DATE_NOT_FOUND.to_string(),
            url: url.into(),
            author_name: ANONYMOUS_AUTHOR.to_string(),
            author_profile_url: PROFILE_NOT_FOUND.to_string(),
        }
    }

    /// Build an article from raw lookups, resolving absent ones to sentinels.
    pub fn from_lookups(
        url: impl Into<String>,
        title: Lookup,
        published_at: Lookup,
        author_name: Lookup,
        author_profile_url: Lookup,
    ) -> Self {
        Self {
            title: title.or_sentinel(TITLE_NOT_FOUND),
            published_at: published_at.or_sentinel(DATE_NOT_FOUND),
            url: url.into(),
            author_name: author_name.or_sentinel(ANONYMOUS_AUTHOR),
            author_profile_url: author_profile_url.or_sentinel(PROFILE_NOT_FOUND),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_lookups_resolve_to_sentinels() {
        let article = Article::from_lookups(
            "https://example.com/a",
            Lookup::Absent,
            Lookup::Absent,
            Lookup::Absent,
            Lookup::Absent,
        );
        assert_eq!(article, Article::placeholder("https://example.com/a"));
    }

    #[test]
    fn present_lookups_are_kept_verbatim() {
        let article = Article::from_lookups(
            "https://example.com/a",
            Lookup::Present(" Title ".into()),
            Lookup::Present("2024-01-01, 10:00".into()),
            Lookup::from(Some("alice".to_string())),
            Lookup::from(None),
        );
        assert_eq!(article.title, " Title ");
        assert_eq!(article.published_at, "2024-01-01, 10:00");
        assert_eq!(article.author_name, "alice");
        assert_eq!(article.author_profile_url, PROFILE_NOT_FOUND);
    }

    #[test]
    fn empty_text_counts_as_present() {
        let lookup = Lookup::from_option(Some(String::new()));
        assert_eq!(lookup, Lookup::Present(String::new()));
        assert_eq!(lookup.or_sentinel(TITLE_NOT_FOUND), "");
    }
}
