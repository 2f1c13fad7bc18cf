// Crawl orchestration and boundary resolution against simulated sources.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use encoding_rs::GBK;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use tiebarank_core::config::SiteConfig;
use tiebarank_core::RankLevel;
use tiebarank_crawler::resolver::{resolve_rank, RankScanner, ResolveSettings};
use tiebarank_crawler::{crawl_pages, CrawlError, PageSource, SiteClient};

fn ranking_html(first_rank: u64, levels: &[u32]) -> Vec<u8> {
    let rows: String = levels
        .iter()
        .enumerate()
        .map(|(i, lv)| {
            let rank = first_rank + i as u64;
            format!(
                r#"<div class="drl_list_item">
                    <span class="drl_item_index">{rank}</span>
                    <span class="drl_item_card"><a href="/home/main?un=m{rank}">成员{rank}</a></span>
                    <span class="drl_item_title"><div class="bg_lv{lv}"></div></span>
                    <span class="drl_item_exp">{exp}</span>
                </div>"#,
                exp = 100_000 - rank
            )
        })
        .collect();
    let html = format!(
        r#"<html><body><span class="drl_info_txt_gray">5000</span>{rows}</body></html>"#
    );
    GBK.encode(&html).0.into_owned()
}

/// Serves 20-record pages; one page number can be rigged to fail.
struct FakeSite {
    failing: Option<u32>,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeSite {
    fn new(failing: Option<u32>) -> Self {
        Self {
            failing,
            completed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageSource for FakeSite {
    async fn fetch(&self, page: u32) -> tiebarank_crawler::Result<Vec<u8>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.failing == Some(page) {
            return Err(CrawlError::Http {
                status: 503,
                message: format!("page {page} unavailable"),
            });
        }
        let first = u64::from(page - 1) * 20 + 1;
        Ok(ranking_html(first, &[10; 20]))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_page_does_not_cancel_siblings() {
    let site = Arc::new(FakeSite::new(Some(7)));
    let err = crawl_pages(site.clone(), 1..=10, 4).await.unwrap_err();

    assert_eq!(site.completed.load(Ordering::SeqCst), 10);
    assert!(site.peak.load(Ordering::SeqCst) <= 4);
    match err {
        CrawlError::Http { status, message } => {
            assert_eq!(status, 503);
            assert!(message.contains("page 7"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn successful_batch_merges_in_rank_order() {
    let site = Arc::new(FakeSite::new(None));
    let out = crawl_pages(site.clone(), [3, 1, 2], 2).await.unwrap();

    assert_eq!(out.records.len(), 60);
    assert_eq!(out.total_members, Some(5000));
    assert!(out.records.windows(2).all(|w| w[0].rank < w[1].rank));
    assert_eq!(out.records[0].rank, 1);
    assert_eq!(out.records[0].name, "成员1");
}

#[tokio::test]
async fn zero_concurrency_still_makes_progress() {
    let site = Arc::new(FakeSite::new(None));
    let out = crawl_pages(site, [1], 0).await.unwrap();
    assert_eq!(out.records.len(), 20);
}

/// A shard that knows a handful of ranks by page.
struct SimulatedShard {
    pages: HashMap<u32, Vec<RankLevel>>,
    scans: AtomicUsize,
    broken: bool,
}

impl SimulatedShard {
    fn with_page(page: u32, first_rank: u64, levels: &[u32]) -> Self {
        let rows = levels
            .iter()
            .enumerate()
            .map(|(i, &level)| RankLevel {
                rank: first_rank + i as u64,
                level,
            })
            .collect();
        Self {
            pages: HashMap::from([(page, rows)]),
            scans: AtomicUsize::new(0),
            broken: false,
        }
    }
}

#[async_trait]
impl RankScanner for SimulatedShard {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn scan(&self, page: u32) -> tiebarank_crawler::Result<Vec<RankLevel>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(CrawlError::Network("connection reset".into()));
        }
        Ok(self.pages.get(&page).cloned().unwrap_or_default())
    }
}

fn settings(workers: u32, max_rounds: Option<u32>) -> ResolveSettings {
    ResolveSettings {
        page_size: 20,
        workers,
        max_rounds,
    }
}

#[tokio::test]
async fn resolves_boundary_from_simulated_shard() {
    let shard: Arc<dyn RankScanner> =
        Arc::new(SimulatedShard::with_page(3, 41, &[12, 12, 11, 9, 9]));
    let rank = resolve_rank(10, 41, &[shard], &settings(2, None)).await.unwrap();
    assert_eq!(rank, 43);
}

#[tokio::test]
async fn empty_rounds_advance_the_window() {
    let shard = Arc::new(SimulatedShard::with_page(7, 121, &[12, 12, 11, 9, 9]));
    let scanners: Vec<Arc<dyn RankScanner>> = vec![shard.clone()];
    // window of 2 pages starting at page 1: rounds cover 1-2, 3-4, 5-6, 7-8
    let rank = resolve_rank(10, 1, &scanners, &settings(2, None)).await.unwrap();
    assert_eq!(rank, 123);
    assert_eq!(shard.scans.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn minimum_candidate_across_shards_wins() {
    let early: Arc<dyn RankScanner> = Arc::new(SimulatedShard::with_page(3, 41, &[12, 9]));
    let late: Arc<dyn RankScanner> = Arc::new(SimulatedShard::with_page(4, 61, &[9, 9]));
    let rank = resolve_rank(10, 41, &[late, early], &settings(2, None)).await.unwrap();
    assert_eq!(rank, 41);
}

#[tokio::test]
async fn failing_rounds_are_treated_as_empty() {
    let mut broken = SimulatedShard::with_page(1, 1, &[1]);
    broken.broken = true;
    let scanners: Vec<Arc<dyn RankScanner>> = vec![Arc::new(broken)];
    let err = resolve_rank(10, 1, &scanners, &settings(3, Some(2))).await.unwrap_err();
    assert!(matches!(err, CrawlError::Exhausted { rounds: 2 }));
}

#[tokio::test]
async fn no_scanners_is_an_error() {
    let err = resolve_rank(10, 1, &[], &settings(1, None)).await.unwrap_err();
    assert!(matches!(err, CrawlError::Exhausted { rounds: 0 }));
}

/// One-shot HTTP/1.1 responder on loopback.
async fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = sock.read(&mut buf).await;
        let head = format!(
            "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        sock.write_all(head.as_bytes()).await.unwrap();
        sock.write_all(&body).await.unwrap();
        sock.shutdown().await.ok();
    });
    format!("http://{addr}")
}

fn client_for(base_url: String) -> SiteClient {
    let site = SiteConfig {
        base_url,
        ..SiteConfig::default()
    };
    SiteClient::new(&site, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn http_fetch_returns_page_bytes() {
    let base = serve_once("200 OK", ranking_html(1, &[18, 17])).await;
    let client = client_for(base);
    let page = tiebarank_crawler::crawl_page(&client, 1).await.unwrap();
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[1].name, "成员2");
}

#[tokio::test]
async fn http_non_200_is_an_http_error() {
    let base = serve_once("404 Not Found", b"gone".to_vec()).await;
    let client = client_for(base);
    let err = client.fetch(1).await.unwrap_err();
    assert!(matches!(err, CrawlError::Http { status: 404, .. }), "got {err:?}");
}
