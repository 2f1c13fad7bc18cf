//! Paged member listings and bulk crawls.

use std::ops::RangeInclusive;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tiebarank_core::{MemberRecord, Page, RankError, Result};
use tiebarank_crawler::{crawl_page, crawl_pages, CrawlError};

use crate::service::RankService;

const MEMBERS_TOTAL_KEY: &str = "members_total";
const PROFILE_GONE_PREFIX: &str = "profile_gone_";

/// One page of the leaderboard as served to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageListing {
    pub page: u32,
    pub records: Vec<MemberRecord>,
    /// Community member count; `site.min_members` until a crawl publishes one.
    pub total: u64,
}

/// Which site page serves caller page `page`, and which slice of it.
///
/// A `page_size` of half a site page maps odd pages to the first half and
/// even pages to the second.
pub fn site_window(page: u32, page_size: u32, site_page_size: u32) -> Result<(u32, usize, usize)> {
    if page == 0 {
        return Err(RankError::BadRequest("pages start at 1".to_string()));
    }
    let site = site_page_size as usize;
    if page_size == site_page_size {
        Ok((page, 0, site))
    } else if page_size.checked_mul(2) == Some(site_page_size) {
        let half = site / 2;
        let offset = if page % 2 == 1 { 0 } else { half };
        Ok((page.div_ceil(2), offset, offset + half))
    } else {
        Err(RankError::BadRequest(format!(
            "page size must be {} or {}",
            site_page_size,
            site_page_size / 2
        )))
    }
}

impl RankService {
    /// A page of the leaderboard with nicknames filled in.
    pub async fn list_page(&self, page: u32, page_size: u32) -> Result<PageListing> {
        let (site_page, from, to) = site_window(page, page_size, self.config.site.page_size)?;

        let key = format!("page_{site_page}");
        let ttl = Self::ttl(self.config.cache.page_ttl_secs);
        let crawled: Page = self
            .cache
            .get_or_produce(&key, ttl, || self.fetch_site_page(site_page))
            .await?;

        let end = to.min(crawled.records.len());
        let start = from.min(end);
        let mut records = crawled.records[start..end].to_vec();
        self.fill_nicknames(&mut records).await;

        let total = self.members_total().await;
        debug!(page, page_size, site_page, records = records.len(), "page listed");
        Ok(PageListing {
            page,
            records,
            total,
        })
    }

    /// Crawl `pages` concurrently, resolve nicknames, store every member, and
    /// publish the advertised member total.
    pub async fn crawl_members(&self, pages: RangeInclusive<u32>) -> Result<usize> {
        let started = Instant::now();
        let out = crawl_pages(
            self.sources.pages.clone(),
            pages.clone(),
            self.config.crawl.max_concurrency,
        )
        .await?;

        if let Some(total) = out.total_members {
            self.publish_total(total).await;
        }
        let mut records = out.records;
        self.fill_nicknames(&mut records).await;
        let stored = self.store.upsert_members(&records)?;
        info!(
            first = *pages.start(),
            last = *pages.end(),
            stored,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "members crawled"
        );
        Ok(stored)
    }

    async fn fetch_site_page(&self, site_page: u32) -> Result<Page> {
        let page = crawl_page(self.sources.pages.as_ref(), site_page).await?;
        if let Some(total) = page.total_members {
            self.publish_total(total).await;
        }
        if let Err(e) = self.store.upsert_members(&page.records) {
            warn!(page = site_page, error = %e, "could not store crawled members");
        }
        Ok(page)
    }

    async fn publish_total(&self, total: u64) {
        if let Err(e) = self
            .cache
            .set_u64(MEMBERS_TOTAL_KEY, total, std::time::Duration::ZERO)
            .await
        {
            warn!(total, error = %e, "could not publish member total");
        }
    }

    pub(crate) async fn members_total(&self) -> u64 {
        self.cache
            .get_u64(MEMBERS_TOTAL_KEY)
            .await
            .unwrap_or(self.config.site.min_members)
    }

    /// Stored nicknames first; unknown ones are looked up with at most
    /// `crawl.max_concurrency` profile fetches in flight.
    pub(crate) async fn fill_nicknames(&self, records: &mut [MemberRecord]) {
        let lookups = records
            .iter()
            .map(|r| self.known_or_lookup(&r.link))
            .collect::<Vec<_>>();
        let names: Vec<Option<String>> = stream::iter(lookups)
            .buffered(self.config.crawl.max_concurrency.max(1))
            .collect()
            .await;
        for (record, name) in records.iter_mut().zip(names) {
            record.nickname = name;
        }
    }

    async fn known_or_lookup(&self, link: &str) -> Option<String> {
        match self.store.nickname(link) {
            Ok(Some(name)) => return Some(name),
            Ok(None) => {}
            Err(e) => warn!(link, error = %e, "nickname read failed"),
        }
        let gone_key = format!("{PROFILE_GONE_PREFIX}{link}");
        if self.cache.get::<bool>(&gone_key).await.ok().flatten() == Some(true) {
            return None;
        }
        self.lookup_nickname(link).await.ok().flatten()
    }

    /// Fetch the nickname from the profile page and remember it.
    /// A missing profile is `Ok(None)`.
    pub(crate) async fn lookup_nickname(&self, link: &str) -> Result<Option<String>> {
        match self.sources.profiles.profile(link).await {
            Ok(profile) => {
                if let Err(e) = self.store.set_nickname(link, &profile.nickname) {
                    warn!(link, error = %e, "nickname write failed");
                }
                Ok(Some(profile.nickname))
            }
            Err(CrawlError::MemberNotFound(_)) => {
                debug!(link, "profile gone");
                let ttl = Self::ttl(self.config.cache.page_ttl_secs);
                let gone_key = format!("{PROFILE_GONE_PREFIX}{link}");
                if let Err(e) = self.cache.set(&gone_key, &true, ttl).await {
                    warn!(link, error = %e, "could not remember missing profile");
                }
                Ok(None)
            }
            Err(e) => {
                warn!(link, error = %e, "profile lookup failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_pages_map_one_to_one() {
        assert_eq!(site_window(3, 20, 20).unwrap(), (3, 0, 20));
    }

    #[test]
    fn half_pages_split_site_pages() {
        assert_eq!(site_window(1, 10, 20).unwrap(), (1, 0, 10));
        assert_eq!(site_window(2, 10, 20).unwrap(), (1, 10, 20));
        assert_eq!(site_window(5, 10, 20).unwrap(), (3, 0, 10));
    }

    #[test]
    fn odd_sizes_and_page_zero_are_rejected() {
        assert!(matches!(site_window(1, 7, 20), Err(RankError::BadRequest(_))));
        assert!(matches!(site_window(0, 20, 20), Err(RankError::BadRequest(_))));
    }

    #[test]
    fn huge_page_size_is_rejected_not_overflowed() {
        assert!(matches!(
            site_window(1, 3_000_000_000, 20),
            Err(RankError::BadRequest(_))
        ));
        assert!(matches!(site_window(1, u32::MAX, 20), Err(RankError::BadRequest(_))));
    }
}
