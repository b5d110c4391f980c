use rusqlite::{Connection, OpenFlags};

use crate::model;

/// Opens (or creates) the SQLite file in WAL mode.
pub fn init_connection(sqlite_file: &str) -> model::Result<Connection> {
    let conn = Connection::open_with_flags(
        sqlite_file,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_row| Ok(()))?;
    Ok(conn)
}
