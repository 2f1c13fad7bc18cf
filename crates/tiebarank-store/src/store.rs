use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::{debug, info};

use tiebarank_core::{DayCounters, Divider, LevelSnapshot, MemberRecord};

use crate::db::init_db;
use crate::error::Result;
use crate::snapshots::StoredSnapshot;
use crate::{dividers, members, snapshots};

/// Search results are capped at this many rows.
pub const SEARCH_LIMIT: usize = 50;

/// Thread-safe handle over the SQLite connection.
///
/// Concurrent upserts of the same member are last-writer-wins.
pub struct RankStore {
    db: Mutex<Connection>,
}

impl RankStore {
    /// Wrap an open connection, creating tables as needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "database opened");
        Self::new(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn upsert_members(&self, records: &[MemberRecord]) -> Result<usize> {
        let mut db = self.db.lock().unwrap();
        let n = members::upsert_members(&mut db, records)?;
        debug!(count = n, "members upserted");
        Ok(n)
    }

    pub fn member(&self, link: &str) -> Result<Option<MemberRecord>> {
        let db = self.db.lock().unwrap();
        members::find_by_link(&db, link)
    }

    /// Stored nickname for `link`, if the member is known and has one.
    pub fn nickname(&self, link: &str) -> Result<Option<String>> {
        Ok(self.member(link)?.and_then(|m| m.nickname))
    }

    pub fn set_nickname(&self, link: &str, nickname: &str) -> Result<bool> {
        let db = self.db.lock().unwrap();
        members::set_nickname(&db, link, nickname)
    }

    pub fn search(&self, keyword: &str) -> Result<Vec<MemberRecord>> {
        let db = self.db.lock().unwrap();
        members::search(&db, keyword, SEARCH_LIMIT)
    }

    pub fn patron_count(&self) -> Result<u64> {
        let db = self.db.lock().unwrap();
        members::count_patrons(&db)
    }

    pub fn top_member(&self) -> Result<Option<MemberRecord>> {
        let db = self.db.lock().unwrap();
        members::top_member(&db)
    }

    pub fn dividers(&self) -> Result<Vec<Divider>> {
        let db = self.db.lock().unwrap();
        dividers::list_dividers(&db)
    }

    pub fn save_dividers(&self, list: &[Divider]) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        dividers::upsert_dividers(&mut db, list)
    }

    pub fn save_snapshot(
        &self,
        date: NaiveDate,
        levels: &LevelSnapshot,
        counters: &DayCounters,
    ) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let inserted = snapshots::save_snapshot(&db, date, levels, counters)?;
        if inserted {
            info!(%date, levels = levels.len(), "snapshot captured");
        } else {
            debug!(%date, "snapshot already present");
        }
        Ok(inserted)
    }

    pub fn snapshot(&self, date: NaiveDate) -> Result<Option<StoredSnapshot>> {
        let db = self.db.lock().unwrap();
        snapshots::load_snapshot(&db, date)
    }
}
