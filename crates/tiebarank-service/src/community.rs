use tiebarank_core::{CommunityTotals, RankError, Result};

use crate::service::RankService;

const TOTALS_KEY: &str = "totals";

impl RankService {
    /// Follower and post counters, cached for `cache.totals_ttl_secs`.
    pub async fn community_totals(&self) -> Result<CommunityTotals> {
        let ttl = Self::ttl(self.config.cache.totals_ttl_secs);
        let totals = self.sources.totals.clone();
        self.cache
            .get_or_produce(TOTALS_KEY, ttl, || async move {
                totals.totals().await.map_err(RankError::from)
            })
            .await
    }
}
