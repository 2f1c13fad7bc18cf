//! `tiebarank-crawler`: everything that talks to the ranking site or to peer
//! shards.
//!
//! | Module         | Role                                               |
//! |----------------|----------------------------------------------------|
//! | `extract`      | GBK page → `MemberRecord`s, all-or-nothing         |
//! | `fetch`        | `PageSource` trait and the HTTP `SiteClient`        |
//! | `orchestrator` | bounded concurrent crawl of many pages             |
//! | `resolver`     | widening-window scan for a level's boundary rank   |
//! | `shard`        | peer `POST /rank` calls and divider refresh        |
//! | `profile`      | nickname lookups from profile pages                |
//! | `totals`       | follower/post counters from the front page         |

pub mod error;
pub mod extract;
pub mod fetch;
pub mod orchestrator;
pub mod profile;
pub mod resolver;
pub mod shard;
pub mod totals;

pub use error::{CrawlError, Result};
pub use fetch::{PageSource, SiteClient};
pub use orchestrator::{crawl_page, crawl_pages, CrawlOutput};
pub use profile::{Profile, ProfileSource};
pub use resolver::{resolve_rank, RankScanner, ResolveSettings};
pub use shard::{refresh_dividers, HttpShardClient, ShardClient};
pub use totals::TotalsSource;
