//! Data gateway for the `Users` table.
//!
//! # Responsibility
//! - Own the process-wide SQLite handle and hand it out one caller at a time.
//! - Run the parameterized user statements and decode rows into `User`.
//!
//! # Invariants
//! - Every caller value reaches SQLite as a bound parameter.
//! - Gateway primitives never begin, commit or roll back a transaction.
//! - Store failures propagate as `StoreError`; only "no row" is mapped to
//!   `None`.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod connection;
pub mod user_gateway;

pub type StoreResult<T> = Result<T, StoreError>;

/// Which bounded wait expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutScope {
    Statement,
    Transaction,
}

impl TimeoutScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Statement => "statement",
            Self::Transaction => "transaction",
        }
    }
}

/// Connectivity or statement failure reported by the store.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// The shared connection stayed locked by another caller.
    Busy { waited_ms: u64 },
    Timeout { scope: TimeoutScope, limit_ms: u64 },
}

impl StoreError {
    /// Returns the SQLite error code behind this failure, if any.
    pub fn sqlite_error_code(&self) -> Option<rusqlite::ErrorCode> {
        match self {
            Self::Db(err) => err.sqlite_error_code(),
            Self::Busy { .. } | Self::Timeout { .. } => None,
        }
    }

    /// Whether the store rejected a row because of a table constraint.
    pub fn is_constraint_violation(&self) -> bool {
        self.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Busy { waited_ms } => {
                write!(f, "shared connection still busy after {waited_ms} ms")
            }
            Self::Timeout { scope, limit_ms } => {
                write!(f, "{} exceeded its {limit_ms} ms deadline", scope.as_str())
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Busy { .. } | Self::Timeout { .. } => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
