use rusqlite::{Connection, Result};

use tiebarank_core::MemberRecord;

/// Create every table the store uses. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_members_table(conn)?;
    create_dividers_table(conn)?;
    create_snapshots_table(conn)?;
    Ok(())
}

/// Members keyed by profile link; display names can change.
fn create_members_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS members (
            link        TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            nickname    TEXT,
            rank        INTEGER NOT NULL,
            level       INTEGER NOT NULL,
            exp         INTEGER NOT NULL,
            patron      INTEGER NOT NULL DEFAULT 0,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_members_rank
            ON members(rank);",
    )
}

/// Last known boundary rank per level.
fn create_dividers_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS dividers (
            level       INTEGER PRIMARY KEY,
            rank        INTEGER NOT NULL,
            updated_at  TEXT NOT NULL
        );",
    )
}

/// One row per site day. `levels` is the cumulative map as JSON.
fn create_snapshots_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS snapshots (
            date        TEXT PRIMARY KEY,
            levels      TEXT NOT NULL,
            followers   INTEGER,
            posts       INTEGER,
            membership  INTEGER NOT NULL DEFAULT 0,
            vip         INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );",
    )
}

pub(crate) const MEMBER_COLUMNS: &str = "rank, name, link, level, exp, patron, nickname";

pub(crate) fn row_to_member(row: &rusqlite::Row<'_>) -> Result<MemberRecord> {
    Ok(MemberRecord {
        rank: row.get::<_, i64>(0)? as u64,
        name: row.get(1)?,
        link: row.get(2)?,
        level: row.get(3)?,
        exp: row.get::<_, i64>(4)? as u64,
        patron: row.get::<_, i32>(5)? != 0,
        nickname: row.get(6)?,
    })
}
