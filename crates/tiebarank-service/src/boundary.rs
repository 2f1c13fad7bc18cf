use std::time::Duration;

use tracing::{info, warn};

use tiebarank_core::{RankError, RankReply, RankRequest, Result};
use tiebarank_crawler::{resolve_rank, CrawlError};

use crate::service::RankService;

impl RankService {
    /// Answer a peer's `POST /rank`: the boundary rank for `request.level`,
    /// scanning forward from `request.rank`.
    ///
    /// The token must have been issued over the decimal text of `rank`.
    pub async fn resolve_boundary(&self, request: RankRequest) -> Result<RankReply> {
        if !self
            .verifier
            .verify(&request.rank.to_string(), &request.token)
        {
            warn!(level = request.level, rank = request.rank, "rejected rank request");
            return Err(RankError::Unauthorized);
        }

        let limit = Duration::from_secs(self.config.crawl.resolve_timeout_secs);
        let scan = resolve_rank(
            request.level,
            request.rank,
            &self.sources.scanners,
            &self.resolve,
        );
        let rank = match tokio::time::timeout(limit, scan).await {
            Ok(result) => result?,
            Err(_) => {
                let ms = limit.as_millis() as u64;
                warn!(level = request.level, ms, "boundary scan timed out");
                return Err(CrawlError::Timeout { ms }.into());
            }
        };

        info!(level = request.level, rank, "boundary answered");
        Ok(RankReply {
            rank,
            level: request.level,
        })
    }
}
