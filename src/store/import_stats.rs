use chrono::{DateTime, Utc};
use rusqlite::{Connection, Result, params};

use crate::model::{ImportStats, ImportStatus};

/// Initializes the import_stats table in the SQLite database.
pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS import_stats (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_at TEXT NOT NULL,
            fetched_count INTEGER NOT NULL,
            filtered_count INTEGER NOT NULL,
            status TEXT NOT NULL,
            error TEXT
        );",
        [],
    )?;
    Ok(())
}

pub fn insert(conn: &Connection, stats: &ImportStats) -> Result<()> {
    conn.execute(
        "INSERT INTO import_stats (run_at, fetched_count, filtered_count, status, error)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            stats.run_at.to_rfc3339(),
            stats.fetched_count as i64,
            stats.filtered_count as i64,
            stats.status.as_str(),
            stats.error,
        ],
    )?;
    Ok(())
}

/// The most recent runs, newest first.
pub fn get_recent(conn: &Connection, limit: usize) -> Result<Vec<ImportStats>> {
    let mut stmt = conn.prepare(
        "SELECT run_at, fetched_count, filtered_count, status, error
         FROM import_stats
         ORDER BY id DESC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
        let run_at: String = row.get(0)?;
        let run_at = DateTime::parse_from_rfc3339(&run_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            })?;
        let status: String = row.get(3)?;
        let status = ImportStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown import status '{status}'").into(),
            )
        })?;
        let fetched: i64 = row.get(1)?;
        let filtered: i64 = row.get(2)?;
        Ok(ImportStats {
            run_at,
            fetched_count: fetched as usize,
            filtered_count: filtered as usize,
            status,
            error: row.get(4)?,
        })
    })?;
    rows.collect()
}
