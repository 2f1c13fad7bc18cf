//! Day-over-day level distribution.
//!
//! Today's numbers come from the shards (cached for
//! `cache.distribution_ttl_secs`); earlier days come from stored snapshots.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tiebarank_core::distribution::{compute_delta, ensure_top_divider, snapshot_from_dividers};
use tiebarank_core::{
    CommunityTotals, DayCounters, DistributionDelta, Divider, LevelSnapshot, RankError, Result,
};
use tiebarank_crawler::refresh_dividers;

use crate::service::RankService;

const DISTRIBUTION_KEY: &str = "distribution";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyDistribution {
    pub date: NaiveDate,
    /// Most senior level first.
    pub distribution: Vec<DistributionDelta>,
    /// Follower/post counters, published member total, and VIP count.
    #[serde(flatten)]
    pub counters: DayCounters,
}

impl RankService {
    /// Per-level ranks for `date` and how they moved since the day before.
    ///
    /// A missing previous snapshot diffs against nothing, so every level
    /// reports its whole bucket as the delta.
    pub async fn daily_distribution(&self, date: NaiveDate) -> Result<DailyDistribution> {
        let today = self.today();
        if date > today {
            return Err(RankError::BadRequest(format!("{date} is in the future")));
        }
        let previous = date
            .pred_opt()
            .ok_or_else(|| RankError::BadRequest(format!("no day before {date}")))?;

        let (current, counters) = if date == today {
            (self.current_levels().await?, self.current_counters().await?)
        } else {
            let stored = self
                .store
                .snapshot(date)?
                .ok_or_else(|| RankError::NotFound(format!("snapshot for {date}")))?;
            (stored.levels, stored.counters)
        };

        let old = self
            .store
            .snapshot(previous)?
            .map(|s| s.levels)
            .unwrap_or_default();

        Ok(DailyDistribution {
            date,
            distribution: compute_delta(&current, &old),
            counters,
        })
    }

    /// Freeze the current level map and counters as the snapshot for
    /// `date`. Returns `false` if `date` already had one.
    pub async fn capture_snapshot(&self, date: NaiveDate) -> Result<bool> {
        let levels = self.current_levels().await?;
        let counters = self.current_counters().await?;
        Ok(self.store.save_snapshot(date, &levels, &counters)?)
    }

    /// Tracked level boundaries, most senior first.
    pub fn dividers(&self) -> Result<Vec<Divider>> {
        Ok(self.store.dividers()?)
    }

    /// Start tracking `divider.level` (or move its boundary). The rank only
    /// seeds the next shard refresh.
    pub fn seed_divider(&self, divider: Divider) -> Result<()> {
        if divider.rank == 0 {
            return Err(RankError::BadRequest("ranks start at 1".to_string()));
        }
        self.store.save_dividers(&[divider])?;
        info!(level = divider.level, rank = divider.rank, "divider seeded");
        Ok(())
    }

    async fn current_levels(&self) -> Result<LevelSnapshot> {
        let ttl = Self::ttl(self.config.cache.distribution_ttl_secs);
        self.cache
            .get_or_produce(DISTRIBUTION_KEY, ttl, || self.refresh_levels())
            .await
    }

    /// Ask every shard for its boundaries and persist what came back.
    /// Levels whose shard did not answer keep their stored rank.
    async fn refresh_levels(&self) -> Result<LevelSnapshot> {
        let mut dividers = self.store.dividers()?;
        if let Some(top) = self.store.top_member()? {
            if let Some(added) = ensure_top_divider(&mut dividers, top.level) {
                info!(level = added.level, "tracking new top level");
            }
        }
        if dividers.is_empty() {
            return Err(RankError::NotFound("no level dividers tracked".to_string()));
        }

        let fresh = refresh_dividers(
            self.sources.shard_client.clone(),
            &self.shards,
            &dividers,
        )
        .await;
        if fresh.is_empty() && !self.shards.is_empty() {
            return Err(RankError::Network("no shard answered".to_string()));
        }
        if fresh.len() < dividers.len() {
            warn!(
                asked = dividers.len(),
                answered = fresh.len(),
                "some levels keep their stored boundary"
            );
        }

        let merged = merge_dividers(&dividers, &fresh);
        self.store.save_dividers(&merged)?;
        Ok(snapshot_from_dividers(&merged))
    }

    async fn current_counters(&self) -> Result<DayCounters> {
        Ok(DayCounters {
            totals: self.totals_or_none().await,
            membership: self.members_total().await,
            vip: self.store.patron_count()?,
        })
    }

    async fn totals_or_none(&self) -> Option<CommunityTotals> {
        match self.community_totals().await {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(error = %e, "community totals unavailable");
                None
            }
        }
    }
}

/// `fresh` overrides `stored` level by level; result is most senior first.
fn merge_dividers(stored: &[Divider], fresh: &[Divider]) -> Vec<Divider> {
    let by_level: BTreeMap<u32, u64> = stored
        .iter()
        .chain(fresh)
        .map(|d| (d.level, d.rank))
        .collect();
    by_level
        .into_iter()
        .rev()
        .map(|(level, rank)| Divider { level, rank })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_dividers_win() {
        let stored = [
            Divider { level: 12, rank: 40 },
            Divider { level: 9, rank: 900 },
        ];
        let fresh = [Divider { level: 9, rank: 950 }];
        assert_eq!(
            merge_dividers(&stored, &fresh),
            vec![Divider { level: 12, rank: 40 }, Divider { level: 9, rank: 950 }]
        );
    }
}
