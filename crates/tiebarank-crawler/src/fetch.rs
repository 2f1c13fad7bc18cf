use std::time::Duration;

use async_trait::async_trait;
use encoding_rs::Encoding;
use reqwest::StatusCode;
use tracing::{debug, warn};

use tiebarank_core::config::{SiteConfig, USER_AGENT};

use crate::error::{CrawlError, Result};
use crate::extract::SITE_ENCODING;

/// Something that can hand back the raw bytes of ranking page `page`.
///
/// Stateless and retry-free: one call, one GET.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, page: u32) -> Result<Vec<u8>>;

    /// Encoding of the bytes `fetch` returns.
    fn encoding(&self) -> &'static Encoding {
        SITE_ENCODING
    }
}

/// HTTP client for the ranking site.
#[derive(Clone)]
pub struct SiteClient {
    client: reqwest::Client,
    base_url: String,
    community: String,
}

impl SiteClient {
    pub fn new(site: &SiteConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CrawlError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: site.base_url.trim_end_matches('/').to_string(),
            community: site.community.clone(),
        })
    }

    pub fn community(&self) -> &str {
        &self.community
    }

    /// Ranking page URL for `page`.
    pub fn ranking_url(&self) -> String {
        format!("{}/f/like/furank", self.base_url)
    }

    /// Community front page URL (member and post counters).
    pub fn front_url(&self) -> String {
        format!("{}/f", self.base_url)
    }

    /// Absolute URL for a site-relative profile link.
    pub fn profile_url(&self, link: &str) -> String {
        format!("{}{}", self.base_url, link)
    }

    /// GET `url` and return the body, failing on anything but 200.
    pub(crate) async fn get_bytes(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<u8>> {
        let resp = self.client.get(url).query(query).send().await.map_err(|e| {
            warn!(url, error = %e, "request failed");
            CrawlError::from(e)
        })?;

        let status = resp.status();
        if status != StatusCode::OK {
            warn!(url, status = status.as_u16(), "unexpected status");
            return Err(CrawlError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body = resp.bytes().await.map_err(CrawlError::from)?;
        debug!(url, bytes = body.len(), "fetched");
        Ok(body.to_vec())
    }
}

#[async_trait]
impl PageSource for SiteClient {
    async fn fetch(&self, page: u32) -> Result<Vec<u8>> {
        let pn = page.to_string();
        self.get_bytes(
            &self.ranking_url(),
            &[("kw", self.community.as_str()), ("pn", pn.as_str())],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_templated_from_config() {
        let site = SiteConfig {
            base_url: "http://example.test/".to_string(),
            ..SiteConfig::default()
        };
        let client = SiteClient::new(&site, Duration::from_secs(1)).unwrap();
        assert_eq!(client.ranking_url(), "http://example.test/f/like/furank");
        assert_eq!(client.front_url(), "http://example.test/f");
        assert_eq!(
            client.profile_url("/home/main?un=a"),
            "http://example.test/home/main?un=a"
        );
    }

    #[tokio::test]
    async fn connection_refused_is_a_network_error() {
        let site = SiteConfig {
            // port 9 (discard) on loopback is closed in CI sandboxes
            base_url: "http://127.0.0.1:9".to_string(),
            ..SiteConfig::default()
        };
        let client = SiteClient::new(&site, Duration::from_secs(2)).unwrap();
        let err = client.fetch(1).await.unwrap_err();
        assert!(matches!(err, CrawlError::Network(_)), "got {err:?}");
    }
}
