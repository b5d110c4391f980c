use rusqlite::{Connection, Result, params};

/// Initializes the symbols table in the SQLite database.
pub fn create_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS symbols (
            symbol TEXT PRIMARY KEY NOT NULL,
            source TEXT NOT NULL
        );",
        [],
    )?;
    Ok(())
}

/// Inserts symbols, replacing the source of ones already present.
pub fn upsert_symbols(conn: &mut Connection, symbols: &[String], source: &str) -> Result<usize> {
    let transaction = conn.transaction()?;
    let mut written = 0;
    {
        let mut stmt =
            transaction.prepare("REPLACE INTO symbols (symbol, source) VALUES (?1, ?2)")?;
        for symbol in symbols {
            written += stmt.execute(params![symbol, source])?;
        }
    }
    transaction.commit()?;
    Ok(written)
}

/// All stored symbols in alphabetical order.
pub fn get_symbols(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT symbol FROM symbols ORDER BY symbol")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}
