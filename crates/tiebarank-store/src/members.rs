use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use tiebarank_core::MemberRecord;

use crate::db::{row_to_member, MEMBER_COLUMNS};
use crate::error::Result;

/// Insert or refresh members by link. A known nickname is kept when the
/// incoming record has none.
pub fn upsert_members(conn: &mut Connection, records: &[MemberRecord]) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO members (link, name, nickname, rank, level, exp, patron, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(link) DO UPDATE SET
                name = excluded.name,
                nickname = COALESCE(excluded.nickname, members.nickname),
                rank = excluded.rank,
                level = excluded.level,
                exp = excluded.exp,
                patron = excluded.patron,
                updated_at = excluded.updated_at",
        )?;
        for r in records {
            stmt.execute(params![
                r.link,
                r.name,
                r.nickname,
                r.rank as i64,
                r.level,
                r.exp as i64,
                r.patron as i32,
                now,
            ])?;
        }
    }
    tx.commit()?;
    Ok(records.len())
}

pub fn find_by_link(conn: &Connection, link: &str) -> Result<Option<MemberRecord>> {
    let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE link = ?1");
    Ok(conn
        .query_row(&sql, params![link], row_to_member)
        .optional()?)
}

pub fn set_nickname(conn: &Connection, link: &str, nickname: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE members SET nickname = ?2, updated_at = ?3 WHERE link = ?1",
        params![link, nickname, Utc::now().to_rfc3339()],
    )?;
    Ok(changed > 0)
}

/// Members whose name or nickname contains `keyword`, best rank first.
pub fn search(conn: &Connection, keyword: &str, limit: usize) -> Result<Vec<MemberRecord>> {
    let pattern = format!("%{}%", escape_like(keyword));
    let sql = format!(
        "SELECT {MEMBER_COLUMNS} FROM members
         WHERE name LIKE ?1 ESCAPE '\\' OR nickname LIKE ?1 ESCAPE '\\'
         ORDER BY rank ASC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![pattern, limit as i64], row_to_member)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// The best-ranked member on record.
pub fn top_member(conn: &Connection) -> Result<Option<MemberRecord>> {
    let sql = format!("SELECT {MEMBER_COLUMNS} FROM members ORDER BY rank ASC LIMIT 1");
    Ok(conn.query_row(&sql, [], row_to_member).optional()?)
}

/// Stored members carrying the VIP marker.
pub fn count_patrons(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM members WHERE patron = 1", [], |row| {
        row.get(0)
    })?;
    Ok(n as u64)
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
