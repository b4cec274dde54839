//! SQLite storage bootstrap for the users core.
//!
//! # Responsibility
//! - Open and configure SQLite connections.
//! - Make sure the `Users` table exists before the gateway touches it.
//!
//! # Invariants
//! - Returned connections report every failure as `Err`, never as a silent
//!   return code.
//! - Schema bootstrap is idempotent and never alters an existing table.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;
pub mod schema;

pub use open::{open_db, open_db_in_memory, open_with_config};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Schema bootstrap ran but the `Users` table is still missing columns.
    IncompatibleSchema { missing_column: &'static str },
}

impl DbError {
    /// Returns the SQLite extended error code, if this is an engine failure.
    pub fn sqlite_error_code(&self) -> Option<rusqlite::ErrorCode> {
        match self {
            Self::Sqlite(err) => err.sqlite_error_code(),
            Self::IncompatibleSchema { .. } => None,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::IncompatibleSchema { missing_column } => {
                write!(f, "existing Users table has no `{missing_column}` column")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::IncompatibleSchema { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
