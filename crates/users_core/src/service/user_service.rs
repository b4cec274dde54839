//! User use-case service.
//!
//! # Responsibility
//! - Expose the age-filter and name-lookup reads.
//! - Insert batches of users inside one transaction.
//!
//! # Invariants
//! - `add_users` either persists every tuple of the batch or none of them.
//! - A failed batch is always reported to the caller, never returned as an
//!   empty success.
//! - The shared connection stays locked for the whole batch transaction, so
//!   concurrent batches never share a transaction.

use crate::gateway::connection::{duration_ms, SharedConnection};
use crate::gateway::user_gateway::{SqliteUserGateway, UserGateway};
use crate::gateway::{StoreError, TimeoutScope};
use crate::model::user::{NewUser, User, UserId};
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Maximum number of users returned by `get_users`.
pub const LIMIT: u32 = 10;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// A batch insert that was rolled back. Nothing from the batch is persisted.
#[derive(Debug)]
pub struct BatchInsertError {
    /// Index of the tuple whose insert failed; `None` when every insert ran
    /// and the commit itself failed.
    pub failed_index: Option<usize>,
    pub batch_len: usize,
    pub source: StoreError,
}

impl Display for BatchInsertError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.failed_index {
            Some(index) => write!(
                f,
                "batch of {} users rolled back at item {index}: {}",
                self.batch_len, self.source
            ),
            None => write!(
                f,
                "batch of {} users rolled back at commit: {}",
                self.batch_len, self.source
            ),
        }
    }
}

impl Error for BatchInsertError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Service error for user use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Store failure outside a batch insert.
    Store(StoreError),
    /// Batch insert failed and was rolled back.
    BatchInsert(BatchInsertError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::BatchInsert(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::BatchInsert(err) => Some(err),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(value.into())
    }
}

impl From<BatchInsertError> for ServiceError {
    fn from(value: BatchInsertError) -> Self {
        Self::BatchInsert(value)
    }
}

/// Use-case service over the shared users connection.
pub struct UserService<'db> {
    db: &'db SharedConnection,
}

impl UserService<'static> {
    /// Service bound to the process-wide connection.
    pub fn global() -> Self {
        Self::new(SharedConnection::global())
    }
}

impl<'db> UserService<'db> {
    pub fn new(db: &'db SharedConnection) -> Self {
        Self { db }
    }

    /// Returns up to `LIMIT` users strictly older than `age_from`.
    pub fn get_users(&self, age_from: i64) -> ServiceResult<Vec<User>> {
        let conn = self.db.connection()?;
        let users = self.gateway(&conn).query_users_older_than(age_from, LIMIT)?;
        Ok(users)
    }

    /// Looks up one user by exact name.
    pub fn get_user_by_name(&self, name: &str) -> ServiceResult<Option<User>> {
        let conn = self.db.connection()?;
        let user = self.gateway(&conn).query_user_by_name(name)?;
        Ok(user)
    }

    /// Looks up each name in turn.
    ///
    /// The result has one entry per input name, in input order; a name with
    /// no matching user yields `None`.
    pub fn get_by_names<I, S>(&self, names: I) -> ServiceResult<Vec<Option<User>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let conn = self.db.connection()?;
        let gateway = self.gateway(&conn);
        let mut users = Vec::new();
        for name in names {
            users.push(gateway.query_user_by_name(name.as_ref())?);
        }
        Ok(users)
    }

    /// Inserts every user of the batch in one transaction.
    ///
    /// # Contract
    /// - Returns the new ids in input order when the whole batch committed.
    /// - Rolls back and returns `ServiceError::BatchInsert` when any insert
    ///   or the commit fails, or the transaction deadline passes.
    pub fn add_users(&self, users: &[NewUser]) -> ServiceResult<Vec<UserId>> {
        let started_at = Instant::now();
        let mut conn = self.db.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        info!(
            "event=add_users module=service status=start batch_len={}",
            users.len()
        );

        let ids = match self.insert_batch(&tx, users, started_at) {
            Ok(ids) => ids,
            Err((index, source)) => {
                rollback_logged(tx);
                warn!(
                    "event=add_users module=service status=rolled_back batch_len={} failed_index={index} duration_ms={} error={}",
                    users.len(),
                    started_at.elapsed().as_millis(),
                    source
                );
                return Err(BatchInsertError {
                    failed_index: Some(index),
                    batch_len: users.len(),
                    source,
                }
                .into());
            }
        };

        if let Err(err) = tx.commit() {
            error!(
                "event=add_users module=service status=rolled_back batch_len={} stage=commit duration_ms={} error={}",
                users.len(),
                started_at.elapsed().as_millis(),
                err
            );
            return Err(BatchInsertError {
                failed_index: None,
                batch_len: users.len(),
                source: err.into(),
            }
            .into());
        }

        info!(
            "event=add_users module=service status=committed batch_len={} first_id={:?} duration_ms={}",
            users.len(),
            ids.first(),
            started_at.elapsed().as_millis()
        );
        Ok(ids)
    }

    fn insert_batch(
        &self,
        tx: &Transaction<'_>,
        users: &[NewUser],
        started_at: Instant,
    ) -> Result<Vec<UserId>, (usize, StoreError)> {
        let config = self.db.config();
        let transaction_timeout = config.transaction_timeout();
        let mut ids = Vec::with_capacity(users.len());

        for (index, user) in users.iter().enumerate() {
            let remaining = transaction_timeout.saturating_sub(started_at.elapsed());
            if remaining.is_zero() {
                return Err((
                    index,
                    StoreError::Timeout {
                        scope: TimeoutScope::Transaction,
                        limit_ms: duration_ms(transaction_timeout),
                    },
                ));
            }

            let gateway = SqliteUserGateway::new(tx)
                .with_statement_timeout(config.statement_timeout().min(remaining));
            let id = gateway
                .insert_user(&user.name, &user.last_name, user.age)
                .map_err(|err| (index, err))?;
            ids.push(id);
        }

        Ok(ids)
    }

    fn gateway<'conn>(&self, conn: &'conn Connection) -> SqliteUserGateway<'conn> {
        SqliteUserGateway::new(conn).with_statement_timeout(self.db.config().statement_timeout())
    }
}

fn rollback_logged(tx: Transaction<'_>) {
    // An interrupted statement may already have ended the transaction.
    if let Err(err) = tx.rollback() {
        error!("event=add_users module=service status=rollback_failed error={err}");
    }
}
