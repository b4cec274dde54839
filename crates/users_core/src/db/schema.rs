//! `Users` table bootstrap.
//!
//! Creates the table when it is missing and checks that a pre-existing table
//! exposes every column the gateway selects. This is not a migration runner:
//! an incompatible table is reported, never rewritten.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Columns read or written by the gateway statements.
pub const USER_COLUMNS: &[&str] = &["id", "name", "lastName", "from", "age", "settings"];

/// Creates the `Users` table and indexes if absent, then validates columns.
pub fn ensure_schema(conn: &mut Connection) -> DbResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA_SQL)?;
    let present = table_columns(&tx, "Users")?;
    tx.commit()?;

    for &column in USER_COLUMNS {
        if !present.iter().any(|name| name == column) {
            return Err(DbError::IncompatibleSchema {
                missing_column: column,
            });
        }
    }

    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1);")?;
    let mut rows = stmt.query([table])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(0)?);
    }
    Ok(columns)
}
