//! Rank-boundary resolver: finds the worst rank still at or above a level.
//!
//! This is a forward scan, not a binary search. Starting from the page that
//! held the previous boundary, each round probes a window of pages on every
//! scanner; any member below the target level marks a candidate boundary of
//! `rank - 1`, and the smallest candidate wins. Empty rounds slide the window
//! forward.
//!
//! The scan assumes level never increases with rank inside the window. The
//! live ranking churns while we read it, so an answer can be slightly stale.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use tiebarank_core::config::{CrawlConfig, SiteConfig};
use tiebarank_core::RankLevel;

use crate::error::{CrawlError, Result};
use crate::extract::extract_rank_levels;
use crate::fetch::{PageSource, SiteClient};

/// A source of `(rank, level)` pairs for one ranking page.
#[async_trait]
pub trait RankScanner: Send + Sync {
    /// Label for logs.
    fn name(&self) -> &str;

    async fn scan(&self, page: u32) -> Result<Vec<RankLevel>>;
}

#[async_trait]
impl RankScanner for SiteClient {
    fn name(&self) -> &str {
        self.community()
    }

    async fn scan(&self, page: u32) -> Result<Vec<RankLevel>> {
        let bytes = self.fetch(page).await?;
        extract_rank_levels(&bytes, self.encoding())
    }
}

/// Knobs for one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveSettings {
    pub page_size: u32,
    /// Pages probed per round.
    pub workers: u32,
    pub max_rounds: Option<u32>,
}

impl ResolveSettings {
    /// Workers = available parallelism × `crawl.worker_multiplier`.
    pub fn from_config(site: &SiteConfig, crawl: &CrawlConfig) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let workers = (cpus * crawl.worker_multiplier.max(1)).min(u32::MAX as usize) as u32;
        Self {
            page_size: site.page_size.max(1),
            workers,
            max_rounds: crawl.max_rounds,
        }
    }
}

/// First page of the scan window: the page that held `estimate_rank`.
pub fn start_page(estimate_rank: u64, page_size: u32) -> u32 {
    let page = estimate_rank.div_ceil(u64::from(page_size.max(1)));
    page.clamp(1, u64::from(u32::MAX)) as u32
}

/// Resolve the boundary rank for `target_level`.
///
/// Loops until some round finds a member below the level. Fetch failures are
/// logged and count as empty pages, so callers should bound this with a
/// timeout or `max_rounds`.
pub async fn resolve_rank(
    target_level: u32,
    estimate_rank: u64,
    scanners: &[Arc<dyn RankScanner>],
    settings: &ResolveSettings,
) -> Result<u64> {
    if scanners.is_empty() {
        return Err(CrawlError::Exhausted { rounds: 0 });
    }

    let started = Instant::now();
    let workers = settings.workers.max(1);
    let mut first = start_page(estimate_rank, settings.page_size);
    let mut round = 0u32;

    loop {
        round += 1;
        if let Some(rank) = scan_round(target_level, first, workers, scanners).await {
            info!(
                level = target_level,
                rank,
                rounds = round,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "boundary resolved"
            );
            return Ok(rank);
        }
        if settings.max_rounds.is_some_and(|m| round >= m) {
            warn!(level = target_level, rounds = round, "boundary scan gave up");
            return Err(CrawlError::Exhausted { rounds: round });
        }
        debug!(level = target_level, from_page = first, "empty round, advancing window");
        first = first.saturating_add(workers);
    }
}

/// One window: pages `first..first + workers` on every scanner.
async fn scan_round(
    target_level: u32,
    first: u32,
    workers: u32,
    scanners: &[Arc<dyn RankScanner>],
) -> Option<u64> {
    let mut tasks = JoinSet::new();
    for offset in 0..workers {
        let page = first.saturating_add(offset);
        for scanner in scanners {
            let scanner = Arc::clone(scanner);
            tasks.spawn(async move {
                match scanner.scan(page).await {
                    Ok(rows) => boundary_candidate(&rows, target_level),
                    Err(e) => {
                        warn!(scanner = scanner.name(), page, error = %e, "scan failed");
                        None
                    }
                }
            });
        }
    }

    let mut best: Option<u64> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(candidate)) => {
                best = Some(best.map_or(candidate, |b| b.min(candidate)));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "scan task panicked"),
        }
    }
    best
}

/// Smallest `rank - 1` over rows whose level is below the target.
pub fn boundary_candidate(rows: &[RankLevel], target_level: u32) -> Option<u64> {
    rows.iter()
        .filter(|r| r.level < target_level)
        .map(|r| r.rank.saturating_sub(1))
        .min()
}
