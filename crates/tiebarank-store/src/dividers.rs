use chrono::Utc;
use rusqlite::{params, Connection};

use tiebarank_core::Divider;

use crate::error::Result;

/// All tracked dividers, most senior level first.
pub fn list_dividers(conn: &Connection) -> Result<Vec<Divider>> {
    let mut stmt = conn.prepare("SELECT level, rank FROM dividers ORDER BY level DESC")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Divider {
                level: row.get(0)?,
                rank: row.get::<_, i64>(1)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn upsert_dividers(conn: &mut Connection, dividers: &[Divider]) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO dividers (level, rank, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(level) DO UPDATE SET rank = excluded.rank, updated_at = excluded.updated_at",
        )?;
        for d in dividers {
            stmt.execute(params![d.level, d.rank as i64, now])?;
        }
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    #[test]
    fn listed_descending_and_overwritten() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        upsert_dividers(
            &mut conn,
            &[Divider { level: 9, rank: 900 }, Divider { level: 12, rank: 40 }],
        )
        .unwrap();
        upsert_dividers(&mut conn, &[Divider { level: 9, rank: 950 }]).unwrap();

        assert_eq!(
            list_dividers(&conn).unwrap(),
            vec![Divider { level: 12, rank: 40 }, Divider { level: 9, rank: 950 }]
        );
    }
}
