//! `tiebarank-service`: the operations callers use, wired over the crawler,
//! the cache and the store.
//!
//! | Module         | Operations                                          |
//! |----------------|-----------------------------------------------------|
//! | `listing`      | `list_page`, `crawl_members`                        |
//! | `boundary`     | `resolve_boundary`                                  |
//! | `distribution` | `daily_distribution`, `capture_snapshot`            |
//! | `members`      | `search_members`, `member_nickname`                 |
//! | `community`    | `community_totals`                                  |

pub mod boundary;
pub mod community;
pub mod distribution;
pub mod listing;
pub mod members;
pub mod service;

pub use distribution::DailyDistribution;
pub use listing::PageListing;
pub use service::{RankService, Sources};
