//! Site adapter: selectors for one target site, feed link discovery and
//! article field extraction.

use feedwatch_core::{Article, Lookup};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const CRATE_NAME: &str = "feedwatch-adapters";

/// URLs and selectors describing one target site. Missing keys in a
/// deserialized profile fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub base_url: String,
    pub feed_url: String,
    pub feed_item_selector: String,
    pub feed_link_selector: String,
    pub title_selector: String,
    pub title_label_selector: String,
    pub published_selector: String,
    pub published_attr: String,
    pub author_selector: String,
    pub avatar_selector: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            base_url: "https://habr.com".to_string(),
            feed_url: "https://habr.com/ru/feed/".to_string(),
            feed_item_selector: "article.tm-articles-list__item".to_string(),
            feed_link_selector: "a.tm-title__link".to_string(),
            title_selector: "h1.tm-title_h1".to_string(),
            title_label_selector: "span".to_string(),
            published_selector: "time".to_string(),
            published_attr: "title".to_string(),
            author_selector: "a.tm-user-info__username".to_string(),
            avatar_selector: "a.tm-user-info__userpic".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("invalid selector `{selector}` for {field}: {message}")]
    Selector {
        field: &'static str,
        selector: String,
        message: String,
    },
    #[error("invalid base url `{url}`: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

fn compile(field: &'static str, selector: &str) -> Result<Selector, AdapterError> {
    Selector::parse(selector).map_err(|e| AdapterError::Selector {
        field,
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Compiled form of a [`SiteProfile`]. Building it validates every selector,
/// so extraction itself cannot fail.
#[derive(Debug, Clone)]
pub struct SiteAdapter {
    profile: SiteProfile,
    base: Url,
    feed_item: Selector,
    feed_link: Selector,
    title: Selector,
    title_label: Selector,
    published: Selector,
    author: Selector,
    avatar: Selector,
}

impl SiteAdapter {
    pub fn new(profile: SiteProfile) -> Result<Self, AdapterError> {
        let base = Url::parse(&profile.base_url).map_err(|source| AdapterError::BaseUrl {
            url: profile.base_url.clone(),
            source,
        })?;
        Ok(Self {
            feed_item: compile("feed_item_selector", &profile.feed_item_selector)?,
            feed_link: compile("feed_link_selector", &profile.feed_link_selector)?,
            title: compile("title_selector", &profile.title_selector)?,
            title_label: compile("title_label_selector", &profile.title_label_selector)?,
            published: compile("published_selector", &profile.published_selector)?,
            author: compile("author_selector", &profile.author_selector)?,
            avatar: compile("avatar_selector", &profile.avatar_selector)?,
            base,
            profile,
        })
    }

    pub fn feed_url(&self) -> &str {
        &self.profile.feed_url
    }

    /// One entry per feed item, in document order. Items without a usable
    /// link come back as [`Lookup::Absent`] so the caller can report them.
    pub fn feed_links(&self, document: &Html) -> Vec<Lookup> {
        document
            .select(&self.feed_item)
            .map(|item| {
                Lookup::from_option(
                    item.select(&self.feed_link)
                        .next()
                        .and_then(|link| link.value().attr("href"))
                        .and_then(|href| self.resolve(href)),
                )
            })
            .collect()
    }

    pub fn feed_links_from_html(&self, html: &str) -> Vec<Lookup> {
        self.feed_links(&Html::parse_document(html))
    }

    /// Extract the article fields. Total: anything missing becomes the
    /// field's sentinel.
    pub fn extract(&self, document: &Html, url: &str) -> Article {
        Article::from_lookups(
            url,
            self.title_lookup(document),
            self.published_lookup(document),
            self.author_lookup(document),
            self.profile_lookup(document),
        )
    }

    pub fn extract_from_html(&self, html: &str, url: &str) -> Article {
        self.extract(&Html::parse_document(html), url)
    }

    fn first<'a>(&self, document: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
        document.select(selector).next()
    }

    fn title_lookup(&self, document: &Html) -> Lookup {
        self.first(document, &self.title)
            .and_then(|heading| heading.select(&self.title_label).next())
            .map(|label| label.text().collect::<String>())
            .into()
    }

    // Only the first time element counts, even if a later one carries the attribute.
    fn published_lookup(&self, document: &Html) -> Lookup {
        self.first(document, &self.published)
            .and_then(|el| el.value().attr(&self.profile.published_attr))
            .map(ToString::to_string)
            .into()
    }

    fn author_lookup(&self, document: &Html) -> Lookup {
        self.first(document, &self.author)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .into()
    }

    fn profile_lookup(&self, document: &Html) -> Lookup {
        self.first(document, &self.avatar)
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| self.resolve(href))
            .into()
    }

    fn resolve(&self, href: &str) -> Option<String> {
        self.base.join(href.trim()).ok().map(String::from)
    }
}
