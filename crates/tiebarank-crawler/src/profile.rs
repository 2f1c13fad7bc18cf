//! Member profile lookups, used to fill in nicknames.

use std::sync::OnceLock;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CrawlError, Result};
use crate::extract::text_of;
use crate::fetch::SiteClient;

/// Suffix the site appends to a member's name in the profile page title.
const TITLE_SUFFIX: &str = "的贴吧";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub nickname: String,
    pub avatar: String,
}

#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Look up the profile behind a site-relative link.
    async fn profile(&self, link: &str) -> Result<Profile>;
}

#[async_trait]
impl ProfileSource for SiteClient {
    async fn profile(&self, link: &str) -> Result<Profile> {
        let bytes = self.get_bytes(&self.profile_url(link), &[]).await?;
        // Profile pages are served as UTF-8.
        parse_profile(&String::from_utf8_lossy(&bytes), link)
    }
}

/// Pull nickname and avatar out of a profile page.
///
/// A page without the avatar block belongs to a deleted or hidden member.
pub fn parse_profile(html: &str, link: &str) -> Result<Profile> {
    static AVATAR: OnceLock<Selector> = OnceLock::new();
    static TITLE: OnceLock<Selector> = OnceLock::new();
    let avatar_sel =
        AVATAR.get_or_init(|| Selector::parse(".userinfo_left_head img").expect("static selector"));
    let title_sel = TITLE.get_or_init(|| Selector::parse("title").expect("static selector"));

    let doc = Html::parse_document(html);
    let avatar = doc
        .select(avatar_sel)
        .next()
        .and_then(|img| img.value().attr("src"))
        .ok_or_else(|| CrawlError::MemberNotFound(link.to_string()))?
        .to_string();

    let title = doc.select(title_sel).next().map(|t| text_of(&t)).unwrap_or_default();
    let nickname = title
        .split(TITLE_SUFFIX)
        .next()
        .unwrap_or_default()
        .to_string();

    debug!(link, %nickname, "profile parsed");
    Ok(Profile { nickname, avatar })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_comes_from_title() {
        let html = r#"<html><head><title>小派蒙的贴吧_百度贴吧</title></head>
            <body><div class="userinfo_left_head"><img src="//img/a.jpg"></div></body></html>"#;
        let p = parse_profile(html, "/home/main?un=x").unwrap();
        assert_eq!(p.nickname, "小派蒙");
        assert_eq!(p.avatar, "//img/a.jpg");
    }

    #[test]
    fn missing_avatar_means_member_not_found() {
        let html = "<html><head><title>error</title></head><body></body></html>";
        let err = parse_profile(html, "/home/main?un=gone").unwrap_err();
        assert!(matches!(err, CrawlError::MemberNotFound(ref l) if l == "/home/main?un=gone"));
    }
}
