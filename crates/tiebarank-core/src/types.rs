use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{RankError, Result};

/// One row of the community ranking page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub rank: u64,
    /// Display name as rendered by the site.
    pub name: String,
    /// Relative profile URL; stable across renames.
    pub link: String,
    pub level: u32,
    pub exp: u64,
    /// Site VIP marker.
    #[serde(rename = "member")]
    pub patron: bool,
    /// Filled lazily from the member's profile page.
    #[serde(default)]
    pub nickname: Option<String>,
}

/// A fully parsed ranking page. Pages that fail to parse never become a `Page`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u32,
    pub records: Vec<MemberRecord>,
    /// Community member total, if the page advertised one.
    pub total_members: Option<u64>,
}

/// The `(rank, level)` projection the boundary resolver scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankLevel {
    pub rank: u64,
    pub level: u32,
}

/// A cooperating instance authoritative for levels `>= level`, up to the next
/// shard's floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardServer {
    /// Level floor.
    pub level: u32,
    /// Base URL, without trailing slash.
    pub server: String,
}

impl fmt::Display for ShardServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.server, self.level)
    }
}

/// Validated, read-only shard list.
#[derive(Debug, Clone, Default)]
pub struct ShardSet {
    shards: Vec<ShardServer>,
}

impl ShardSet {
    /// Level floors must be strictly increasing in declaration order.
    pub fn new(shards: Vec<ShardServer>) -> Result<Self> {
        for pair in shards.windows(2) {
            if pair[1].level <= pair[0].level {
                return Err(RankError::Config(format!(
                    "shard floors must strictly increase: {} then {}",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(Self { shards })
    }

    /// The shard with the greatest floor not above `level`.
    pub fn route(&self, level: u32) -> Option<&ShardServer> {
        self.shards.iter().rev().find(|s| s.level <= level)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShardServer> {
        self.shards.iter()
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

/// level → number of members at or above that level. Captured once per day.
pub type LevelSnapshot = BTreeMap<u32, u64>;

/// One line of the daily distribution report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionDelta {
    pub level: u32,
    /// Cumulative rank at this level (prefix sum of buckets, senior first).
    pub rank: u64,
    /// Change since the previous snapshot.
    pub delta: i64,
}

/// Last known boundary rank for a level; seeds the resolver's estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Divider {
    pub level: u32,
    pub rank: u64,
}

/// Counters from the community front page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityTotals {
    pub followers: u64,
    pub posts: u64,
}

/// Headline counters frozen with each daily snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DayCounters {
    /// Front-page counters, when the site answered.
    pub totals: Option<CommunityTotals>,
    /// Member total the ranking page advertised.
    pub membership: u64,
    /// Stored members carrying the VIP marker.
    pub vip: u64,
}

/// Body of a peer `POST /rank` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankRequest {
    pub token: String,
    pub rank: u64,
    pub level: u32,
}

/// Peer `POST /rank` reply: the boundary rank for `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankReply {
    pub rank: u64,
    pub level: u32,
}
