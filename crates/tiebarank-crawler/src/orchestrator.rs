//! Bounded fan-out of fetch+extract tasks over a set of ranking pages.
//!
//! Every launched task runs to completion even after a sibling fails; the
//! batch only reports once all of them have been joined. Which error is
//! surfaced when several pages fail depends on completion order.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use tiebarank_core::{MemberRecord, Page};

use crate::error::{CrawlError, Result};
use crate::extract::extract_page;
use crate::fetch::PageSource;

/// Merged result of a successful batch.
#[derive(Debug, Clone, Default)]
pub struct CrawlOutput {
    /// All records, sorted by rank.
    pub records: Vec<MemberRecord>,
    /// First member total any page advertised.
    pub total_members: Option<u64>,
}

/// Fetch and extract a single page.
pub async fn crawl_page(source: &dyn PageSource, page: u32) -> Result<Page> {
    let bytes = source.fetch(page).await?;
    extract_page(page, &bytes, source.encoding())
}

/// Crawl `pages` with at most `max_concurrency` fetches in flight.
///
/// Fails if any page failed; records from the other pages are discarded in
/// that case. Callers wanting partial results should ask for smaller batches.
pub async fn crawl_pages(
    source: Arc<dyn PageSource>,
    pages: impl IntoIterator<Item = u32>,
    max_concurrency: usize,
) -> Result<CrawlOutput> {
    let started = Instant::now();
    let permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for page in pages {
        let source = Arc::clone(&source);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return (page, Err(CrawlError::Task("crawl limiter closed".to_string())));
            };
            (page, crawl_page(source.as_ref(), page).await)
        });
    }

    let launched = tasks.len();
    let mut output = CrawlOutput::default();
    let mut failure: Option<CrawlError> = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((page, Ok(p))) => {
                debug!(page, records = p.records.len(), "page crawled");
                if output.total_members.is_none() {
                    output.total_members = p.total_members;
                }
                output.records.extend(p.records);
            }
            Ok((page, Err(e))) => {
                warn!(page, error = %e, "page crawl failed");
                failure.get_or_insert(e);
            }
            Err(e) => {
                error!(error = %e, "crawl task panicked");
                failure.get_or_insert(CrawlError::Task(e.to_string()));
            }
        }
    }

    if let Some(e) = failure {
        return Err(e);
    }

    output.records.sort_by_key(|r| r.rank);
    info!(
        pages = launched,
        records = output.records.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "crawl batch complete"
    );
    Ok(output)
}
