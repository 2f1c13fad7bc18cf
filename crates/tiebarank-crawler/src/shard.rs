//! Peer shard calls: ask the instance that owns a level for its boundary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{info, warn};

use tiebarank_core::auth::TokenIssuer;
use tiebarank_core::config::USER_AGENT;
use tiebarank_core::{Divider, RankReply, RankRequest, ShardServer, ShardSet};

use crate::error::{CrawlError, Result};

/// Path every shard serves its resolver on.
pub const RANK_PATH: &str = "/api/v2/tieba/rank";

#[async_trait]
pub trait ShardClient: Send + Sync {
    /// Resolve `divider.level` on `shard`, seeding the scan with `divider.rank`.
    async fn resolve(&self, shard: &ShardServer, divider: Divider) -> Result<RankReply>;
}

/// JSON-over-HTTP shard client.
pub struct HttpShardClient {
    client: reqwest::Client,
    tokens: Arc<dyn TokenIssuer>,
}

impl HttpShardClient {
    pub fn new(tokens: Arc<dyn TokenIssuer>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CrawlError::Network(e.to_string()))?;
        Ok(Self { client, tokens })
    }
}

#[async_trait]
impl ShardClient for HttpShardClient {
    async fn resolve(&self, shard: &ShardServer, divider: Divider) -> Result<RankReply> {
        let url = format!("{}{}", shard.server.trim_end_matches('/'), RANK_PATH);
        let body = RankRequest {
            token: self.tokens.issue(&divider.rank.to_string()),
            rank: divider.rank,
            level: divider.level,
        };

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(shard = %shard, status = status.as_u16(), body = %text, "shard rejected request");
            return Err(CrawlError::Http {
                status: status.as_u16(),
                message: text,
            });
        }

        resp.json::<RankReply>()
            .await
            .map_err(|e| CrawlError::Parse(e.to_string()))
    }
}

/// Ask the owning shard of every divider for a fresh boundary, concurrently.
///
/// Dividers whose shard is unknown or whose call fails are left out of the
/// result; the failure is logged.
pub async fn refresh_dividers(
    client: Arc<dyn ShardClient>,
    shards: &ShardSet,
    dividers: &[Divider],
) -> Vec<Divider> {
    let mut tasks = JoinSet::new();
    for &divider in dividers {
        let Some(shard) = shards.route(divider.level).cloned() else {
            warn!(level = divider.level, "no shard owns this level");
            continue;
        };
        let client = Arc::clone(&client);
        tasks.spawn(async move {
            let started = Instant::now();
            let result = client.resolve(&shard, divider).await;
            (shard, divider, result, started.elapsed())
        });
    }

    let mut fresh = Vec::with_capacity(dividers.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((shard, _, Ok(reply), elapsed)) => {
                info!(
                    shard = %shard,
                    level = reply.level,
                    rank = reply.rank,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "shard resolved"
                );
                fresh.push(Divider {
                    level: reply.level,
                    rank: reply.rank,
                });
            }
            Ok((shard, divider, Err(e), _)) => {
                warn!(shard = %shard, level = divider.level, error = %e, "shard resolve failed");
            }
            Err(e) => warn!(error = %e, "shard task panicked"),
        }
    }
    fresh.sort_by(|a, b| b.level.cmp(&a.level));
    fresh
}
