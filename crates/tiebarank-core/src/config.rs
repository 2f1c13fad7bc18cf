use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::types::ShardServer;

// Site constants; must match the ranking page layout exactly
pub const DEFAULT_BASE_URL: &str = "http://tieba.baidu.com";
pub const DEFAULT_COMMUNITY: &str = "原神";
pub const SITE_PAGE_SIZE: u32 = 20; // records per ranking page
pub const MIN_MEMBERS: u64 = 1_000_000; // shown until the first crawl publishes a total
pub const USER_AGENT: &str = concat!("tiebarank/", env!("CARGO_PKG_VERSION"));

/// Top-level config (tiebarank.toml + TIEBARANK_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RankConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Cooperating shard instances, ordered by level floor.
    #[serde(default)]
    pub shards: Vec<ShardServer>,
}

/// Where the ranking pages live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Community id substituted into the `kw` query parameter.
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_min_members")]
    pub min_members: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            community: default_community(),
            page_size: SITE_PAGE_SIZE,
            min_members: MIN_MEMBERS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Upper bound on in-flight page fetches for a single crawl batch.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Resolver workers per round = available parallelism × this.
    #[serde(default = "default_worker_multiplier")]
    pub worker_multiplier: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Wall-clock bound on one boundary resolution.
    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,
    /// Stop the forward scan after this many empty rounds. `None` scans until
    /// a candidate shows up or the timeout fires.
    #[serde(default)]
    pub max_rounds: Option<u32>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            worker_multiplier: default_worker_multiplier(),
            request_timeout_secs: default_request_timeout_secs(),
            resolve_timeout_secs: default_resolve_timeout_secs(),
            max_rounds: None,
        }
    }
}

/// TTLs for the cache-aside entries, all in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_page_ttl")]
    pub page_ttl_secs: u64,
    #[serde(default = "default_totals_ttl")]
    pub totals_ttl_secs: u64,
    #[serde(default = "default_distribution_ttl")]
    pub distribution_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            page_ttl_secs: default_page_ttl(),
            totals_ttl_secs: default_totals_ttl(),
            distribution_ttl_secs: default_distribution_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Shared secret used to sign and check request tokens between shards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_secret")]
    pub secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_community() -> String {
    DEFAULT_COMMUNITY.to_string()
}
fn default_page_size() -> u32 {
    SITE_PAGE_SIZE
}
fn default_min_members() -> u64 {
    MIN_MEMBERS
}
fn default_max_concurrency() -> usize {
    8
}
fn default_worker_multiplier() -> usize {
    2
}
fn default_request_timeout_secs() -> u64 {
    15
}
fn default_resolve_timeout_secs() -> u64 {
    120
}
fn default_key_prefix() -> String {
    "tieba_genshin_".to_string()
}
fn default_page_ttl() -> u64 {
    60
}
fn default_totals_ttl() -> u64 {
    60
}
fn default_distribution_ttl() -> u64 {
    600
}
fn default_secret() -> String {
    "change-me".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tiebarank/tiebarank.db", home)
}

impl RankConfig {
    /// Load config from a TOML file with TIEBARANK_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `TIEBARANK_CRAWL__MAX_CONCURRENCY=16`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RankConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("TIEBARANK_").split("__"))
            .extract()
            .map_err(|e| crate::error::RankError::Config(e.to_string()))?;

        config.validate()?;
        tracing::debug!(path = %path, shards = config.shards.len(), "config loaded");
        Ok(config)
    }

    /// Reject shard lists whose level floors are not strictly increasing.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.site.page_size == 0 {
            return Err(crate::error::RankError::Config(
                "site.page_size must be positive".to_string(),
            ));
        }
        crate::types::ShardSet::new(self.shards.clone()).map(|_| ())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tiebarank/tiebarank.toml", home)
}
