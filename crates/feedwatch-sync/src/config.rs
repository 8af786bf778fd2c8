use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use feedwatch_adapters::SiteProfile;
use feedwatch_storage::{DatabaseConfig, HttpClientConfig};
use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },
    #[error("reading site profile {}: {source}", .path.display())]
    ProfileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing site profile {}: {source}", .path.display())]
    ProfileParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub database: DatabaseConfig,
    pub site: SiteProfile,
    pub poll_interval: Duration,
    pub user_agent: String,
    pub http_timeout: Option<Duration>,
    /// `None` spawns every discovered article at once.
    pub max_concurrent_fetches: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            site: SiteProfile::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            user_agent: "feedwatch/0.1".to_string(),
            http_timeout: None,
            max_concurrent_fetches: None,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source. Blank values count
    /// as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let mut site = match var("FEEDWATCH_SITE_PROFILE") {
            Some(path) => load_site_profile(Path::new(&path))?,
            None => defaults.site,
        };
        if let Some(feed_url) = var("FEEDWATCH_FEED_URL") {
            site.feed_url = feed_url;
        }
        if let Some(base_url) = var("FEEDWATCH_BASE_URL") {
            site.base_url = base_url;
        }

        let db_defaults = defaults.database;
        let database = DatabaseConfig {
            url: var("DATABASE_URL"),
            host: var("FEEDWATCH_DB_HOST").unwrap_or(db_defaults.host),
            port: parse_var(&var, "FEEDWATCH_DB_PORT")?.unwrap_or(db_defaults.port),
            user: var("FEEDWATCH_DB_USER").unwrap_or(db_defaults.user),
            password: var("FEEDWATCH_DB_PASSWORD").unwrap_or(db_defaults.password),
            database: var("FEEDWATCH_DB_NAME").unwrap_or(db_defaults.database),
            max_connections: parse_var(&var, "FEEDWATCH_DB_MAX_CONNECTIONS")?
                .unwrap_or(db_defaults.max_connections),
            min_connections: parse_var(&var, "FEEDWATCH_DB_MIN_CONNECTIONS")?
                .unwrap_or(db_defaults.min_connections),
            acquire_timeout: parse_var::<u64>(&var, "FEEDWATCH_DB_ACQUIRE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(db_defaults.acquire_timeout),
        };

        Ok(Self {
            database,
            site,
            poll_interval: parse_var::<u64>(&var, "FEEDWATCH_POLL_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            user_agent: var("FEEDWATCH_USER_AGENT").unwrap_or(defaults.user_agent),
            http_timeout: parse_var::<u64>(&var, "FEEDWATCH_HTTP_TIMEOUT_SECS")?
                .map(Duration::from_secs),
            max_concurrent_fetches: parse_var::<usize>(&var, "FEEDWATCH_MAX_CONCURRENT_FETCHES")?
                .filter(|n| *n > 0),
        })
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: self.http_timeout,
            user_agent: Some(self.user_agent.clone()),
        }
    }
}

fn parse_var<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match var(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

pub fn load_site_profile(path: &Path) -> Result<SiteProfile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ProfileRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::ProfileParse {
        path: path.to_path_buf(),
        source,
    })
}
