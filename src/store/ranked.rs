use chrono::{DateTime, Utc};
use rusqlite::{Connection, Result, params};

use crate::model::RankedRecord;

/// Initializes the top_stocks table in the SQLite database.
pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS top_stocks (
            symbol TEXT NOT NULL,
            pe REAL NOT NULL,
            sentiment REAL NOT NULL,
            volume_surge REAL NOT NULL,
            score REAL NOT NULL,
            timestamp TEXT NOT NULL
        );",
        [],
    )?;
    Ok(())
}

/// Replaces every row with `records`. The last writer wins.
pub fn replace_all(conn: &mut Connection, records: &[RankedRecord]) -> Result<()> {
    let transaction = conn.transaction()?;
    transaction.execute("DELETE FROM top_stocks", [])?;
    {
        let mut stmt = transaction.prepare(
            "INSERT INTO top_stocks (symbol, pe, sentiment, volume_surge, score, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for record in records {
            stmt.execute(params![
                record.symbol,
                record.pe,
                record.sentiment,
                record.volume_surge,
                record.score,
                record.timestamp.to_rfc3339(),
            ])?;
        }
    }
    transaction.commit()
}

/// Rows by score, highest first; equal scores stay in insertion order.
pub fn get_ranked(conn: &Connection) -> Result<Vec<RankedRecord>> {
    let mut stmt = conn.prepare(
        "SELECT symbol, pe, sentiment, volume_surge, score, timestamp
         FROM top_stocks
         ORDER BY score DESC, rowid ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        let timestamp: String = row.get(5)?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
            })?;
        Ok(RankedRecord {
            symbol: row.get(0)?,
            pe: row.get(1)?,
            sentiment: row.get(2)?,
            volume_surge: row.get(3)?,
            score: row.get(4)?,
            timestamp,
        })
    })?;
    rows.collect()
}
