use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use tiebarank_core::{CommunityTotals, DayCounters, LevelSnapshot};

use crate::error::{Result, StoreError};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A day's frozen level map plus the counters seen that day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub date: NaiveDate,
    pub levels: LevelSnapshot,
    pub counters: DayCounters,
}

/// Record the snapshot for `date`. Snapshots are immutable: returns `false`
/// and leaves the stored row alone when the day already has one.
pub fn save_snapshot(
    conn: &Connection,
    date: NaiveDate,
    levels: &LevelSnapshot,
    counters: &DayCounters,
) -> Result<bool> {
    let json =
        serde_json::to_string(levels).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO snapshots
            (date, levels, followers, posts, membership, vip, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            date.format(DATE_FORMAT).to_string(),
            json,
            counters.totals.map(|t| t.followers as i64),
            counters.totals.map(|t| t.posts as i64),
            counters.membership as i64,
            counters.vip as i64,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(inserted > 0)
}

pub fn load_snapshot(conn: &Connection, date: NaiveDate) -> Result<Option<StoredSnapshot>> {
    let row = conn
        .query_row(
            "SELECT levels, followers, posts, membership, vip FROM snapshots WHERE date = ?1",
            params![date.format(DATE_FORMAT).to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((json, followers, posts, membership, vip)) = row else {
        return Ok(None);
    };
    let levels: LevelSnapshot = serde_json::from_str(&json)
        .map_err(|e| StoreError::Serialization(format!("snapshot {date}: {e}")))?;
    let totals = match (followers, posts) {
        (Some(f), Some(p)) => Some(CommunityTotals {
            followers: f as u64,
            posts: p as u64,
        }),
        _ => None,
    };
    Ok(Some(StoredSnapshot {
        date,
        levels,
        counters: DayCounters {
            totals,
            membership: membership as u64,
            vip: vip as u64,
        },
    }))
}
