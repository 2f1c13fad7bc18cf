use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tracing::info;

use tiebarank_cache::{CacheAside, KvStore, MemoryKv};
use tiebarank_core::auth::{HmacTokens, TokenIssuer, TokenVerifier};
use tiebarank_core::distribution::site_date;
use tiebarank_core::{RankConfig, Result, ShardSet};
use tiebarank_crawler::{
    HttpShardClient, PageSource, ProfileSource, RankScanner, ResolveSettings, ShardClient,
    SiteClient, TotalsSource,
};
use tiebarank_store::RankStore;

/// Everything the service reads from the outside world.
pub struct Sources {
    pub pages: Arc<dyn PageSource>,
    /// Scanned together on every resolver round.
    pub scanners: Vec<Arc<dyn RankScanner>>,
    pub profiles: Arc<dyn ProfileSource>,
    pub totals: Arc<dyn TotalsSource>,
    pub shard_client: Arc<dyn ShardClient>,
}

impl Sources {
    /// Live sources: one site client for pages, profiles, counters, and
    /// scanning, plus an HTTP client for peer shards.
    pub fn from_config(config: &RankConfig, issuer: Arc<dyn TokenIssuer>) -> Result<Self> {
        let request_timeout = Duration::from_secs(config.crawl.request_timeout_secs);
        let site = Arc::new(SiteClient::new(&config.site, request_timeout)?);
        let shard_timeout = Duration::from_secs(config.crawl.resolve_timeout_secs);
        Ok(Self {
            pages: site.clone(),
            scanners: vec![site.clone() as Arc<dyn RankScanner>],
            profiles: site.clone(),
            totals: site,
            shard_client: Arc::new(HttpShardClient::new(issuer, shard_timeout)?),
        })
    }
}

/// The tiebarank facade. Cheap to share behind an `Arc`.
pub struct RankService {
    pub(crate) config: RankConfig,
    pub(crate) shards: ShardSet,
    pub(crate) sources: Sources,
    pub(crate) cache: CacheAside,
    pub(crate) store: Arc<RankStore>,
    pub(crate) verifier: Arc<dyn TokenVerifier>,
    pub(crate) resolve: ResolveSettings,
}

impl RankService {
    pub fn new(
        config: RankConfig,
        sources: Sources,
        kv: Arc<dyn KvStore>,
        store: Arc<RankStore>,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Result<Self> {
        config.validate()?;
        let shards = ShardSet::new(config.shards.clone())?;
        let cache = CacheAside::new(kv, config.cache.key_prefix.clone());
        let resolve = ResolveSettings::from_config(&config.site, &config.crawl);
        Ok(Self {
            config,
            shards,
            sources,
            cache,
            store,
            verifier,
            resolve,
        })
    }

    /// Production wiring: live site, in-process cache, on-disk store, and
    /// HMAC tokens from `auth.secret`.
    pub fn from_config(config: RankConfig) -> Result<Self> {
        let tokens = Arc::new(HmacTokens::new(&config.auth.secret));
        let sources = Sources::from_config(&config, tokens.clone())?;
        let store = Arc::new(RankStore::open(&config.database.path)?);
        info!(
            community = %config.site.community,
            shards = config.shards.len(),
            "rank service ready"
        );
        Self::new(config, sources, Arc::new(MemoryKv::new()), store, tokens)
    }

    pub fn config(&self) -> &RankConfig {
        &self.config
    }

    /// Today on the ranking site's clock.
    pub fn today(&self) -> NaiveDate {
        site_date(Utc::now())
    }

    pub(crate) fn ttl(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }
}
