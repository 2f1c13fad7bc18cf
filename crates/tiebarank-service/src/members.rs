use tracing::debug;

use tiebarank_core::{MemberRecord, RankError, Result};

use crate::service::RankService;

impl RankService {
    /// Stored members whose name or nickname contains `keyword`.
    pub async fn search_members(&self, keyword: &str) -> Result<Vec<MemberRecord>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(RankError::BadRequest("empty search keyword".to_string()));
        }
        let hits = self.store.search(keyword)?;
        debug!(keyword, hits = hits.len(), "member search");
        Ok(hits)
    }

    /// Re-read a member's nickname from their profile page and store it.
    ///
    /// `None` when the profile no longer exists.
    pub async fn member_nickname(&self, link: &str) -> Result<Option<String>> {
        self.lookup_nickname(link).await
    }
}
