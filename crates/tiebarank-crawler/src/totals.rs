//! Community front-page counters.

use std::sync::OnceLock;

use async_trait::async_trait;
use scraper::{Html, Selector};

use tiebarank_core::CommunityTotals;

use crate::error::{CrawlError, Result};
use crate::extract::{parse_count, text_of};
use crate::fetch::SiteClient;

#[async_trait]
pub trait TotalsSource: Send + Sync {
    async fn totals(&self) -> Result<CommunityTotals>;
}

#[async_trait]
impl TotalsSource for SiteClient {
    async fn totals(&self) -> Result<CommunityTotals> {
        let bytes = self
            .get_bytes(&self.front_url(), &[("ie", "utf-8"), ("kw", self.community())])
            .await?;
        parse_totals(&String::from_utf8_lossy(&bytes))
    }
}

/// Read the follower and post counters, e.g. `1,234,567`.
pub fn parse_totals(html: &str) -> Result<CommunityTotals> {
    static MEMBERS: OnceLock<Selector> = OnceLock::new();
    static POSTS: OnceLock<Selector> = OnceLock::new();
    let members = MEMBERS.get_or_init(|| Selector::parse(".card_menNum").expect("static selector"));
    let posts = POSTS.get_or_init(|| Selector::parse(".card_infoNum").expect("static selector"));

    let doc = Html::parse_document(html);
    let read = |sel: &Selector, field: &str| -> Result<u64> {
        let raw = doc.select(sel).next().map(|e| text_of(&e)).unwrap_or_default();
        parse_count(&raw).ok_or_else(|| CrawlError::Parse(format!("bad {field} counter {raw:?}")))
    };

    Ok(CommunityTotals {
        followers: read(members, "member")?,
        posts: read(posts, "post")?,
    })
}
