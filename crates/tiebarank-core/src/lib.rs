//! `tiebarank-core`: types and configuration shared by every tiebarank crate,
//! plus the level distribution math.

pub mod auth;
pub mod config;
pub mod distribution;
pub mod error;
pub mod types;

pub use config::RankConfig;
pub use error::{RankError, Result};
pub use types::{
    CommunityTotals, DayCounters, DistributionDelta, Divider, LevelSnapshot, MemberRecord, Page,
    RankLevel, RankReply, RankRequest, ShardServer, ShardSet,
};
