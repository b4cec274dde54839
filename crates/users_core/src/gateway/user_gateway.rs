//! User gateway contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the fetch-many, fetch-one and insert primitives over `Users`.
//! - Decode the `settings` column into `User::key`.
//!
//! # Invariants
//! - `ageFrom`, `limit`, `name`, `lastName` and `age` are always bound.
//! - `"from"` is quoted because it is an SQL keyword.
//! - Each statement runs under a deadline and is interrupted when it expires.

use crate::gateway::connection::duration_ms;
use crate::gateway::{StoreError, StoreResult, TimeoutScope};
use crate::model::user::{decode_settings_key, User, UserId};
use log::{debug, error};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::ffi::c_int;
use std::time::{Duration, Instant};

const USER_SELECT_SQL: &str = "SELECT
    id,
    name,
    lastName,
    \"from\",
    age,
    settings
FROM Users";

/// SQLite VM instructions between two deadline checks.
const PROGRESS_CHECK_OPS: c_int = 1_000;

const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Parameterized primitives over the `Users` table.
pub trait UserGateway {
    /// Users with `age > age_from`, ordered by id, at most `limit` rows.
    fn query_users_older_than(&self, age_from: i64, limit: u32) -> StoreResult<Vec<User>>;
    /// First user (lowest id) whose name equals `name` exactly.
    fn query_user_by_name(&self, name: &str) -> StoreResult<Option<User>>;
    /// Inserts one user and returns the id assigned by the store.
    fn insert_user(&self, name: &str, last_name: &str, age: i64) -> StoreResult<UserId>;
}

/// SQLite-backed user gateway.
///
/// Works on a plain connection or on an open `rusqlite::Transaction`; the
/// caller decides the transaction scope.
pub struct SqliteUserGateway<'conn> {
    conn: &'conn Connection,
    statement_timeout: Duration,
}

impl<'conn> SqliteUserGateway<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    fn run<T>(
        &self,
        op: &'static str,
        body: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> StoreResult<T> {
        let started_at = Instant::now();
        let result = {
            let _deadline = StatementDeadline::arm(self.conn, self.statement_timeout);
            body(self.conn)
        };

        match result {
            Ok(value) => {
                debug!(
                    "event=user_statement module=gateway op={op} status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) if err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) => {
                let limit_ms = duration_ms(self.statement_timeout);
                error!(
                    "event=user_statement module=gateway op={op} status=timeout duration_ms={} limit_ms={limit_ms}",
                    started_at.elapsed().as_millis()
                );
                Err(StoreError::Timeout {
                    scope: TimeoutScope::Statement,
                    limit_ms,
                })
            }
            Err(err) => {
                error!(
                    "event=user_statement module=gateway op={op} status=error duration_ms={} error_code={:?} error={}",
                    started_at.elapsed().as_millis(),
                    err.sqlite_error_code(),
                    err
                );
                Err(err.into())
            }
        }
    }
}

impl UserGateway for SqliteUserGateway<'_> {
    fn query_users_older_than(&self, age_from: i64, limit: u32) -> StoreResult<Vec<User>> {
        self.run("query_users_older_than", |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "{USER_SELECT_SQL}
                 WHERE age > ?1
                 ORDER BY id ASC
                 LIMIT ?2;"
            ))?;
            let mut rows = stmt.query(params![age_from, i64::from(limit)])?;
            let mut users = Vec::new();
            while let Some(row) = rows.next()? {
                users.push(parse_user_row(row)?);
            }
            Ok(users)
        })
    }

    fn query_user_by_name(&self, name: &str) -> StoreResult<Option<User>> {
        self.run("query_user_by_name", |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "{USER_SELECT_SQL}
                 WHERE name = ?1
                 ORDER BY id ASC
                 LIMIT 1;"
            ))?;
            stmt.query_row([name], parse_user_row).optional()
        })
    }

    fn insert_user(&self, name: &str, last_name: &str, age: i64) -> StoreResult<UserId> {
        self.run("insert_user", |conn| {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO Users (name, lastName, age)
                 VALUES (?1, ?2, ?3);",
            )?;
            stmt.execute(params![name, last_name, age])?;
            Ok(conn.last_insert_rowid())
        })
    }
}

fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let settings = match row.get_ref("settings")? {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok(),
        _ => None,
    };

    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        last_name: row.get("lastName")?,
        // Rows written by older schemas leave `from` NULL.
        from: row.get::<_, Option<String>>("from")?.unwrap_or_default(),
        age: row.get("age")?,
        key: decode_settings_key(settings),
    })
}

/// Interrupts statements on `conn` once the deadline passes. Disarmed on drop.
struct StatementDeadline<'conn> {
    conn: &'conn Connection,
}

impl<'conn> StatementDeadline<'conn> {
    fn arm(conn: &'conn Connection, timeout: Duration) -> Self {
        if let Some(deadline) = Instant::now().checked_add(timeout) {
            conn.progress_handler(PROGRESS_CHECK_OPS, Some(move || Instant::now() >= deadline));
        }
        Self { conn }
    }
}

impl Drop for StatementDeadline<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}
