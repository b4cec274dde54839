//! Gateway configuration.
//!
//! # Responsibility
//! - Describe which SQLite database the shared connection opens.
//! - Carry the bounded waits applied to locks, statements and transactions.
//!
//! # Invariants
//! - Every field has a default, so `{}` is a complete document.
//! - Timeouts are interpreted as milliseconds.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DB_FILE_NAME: &str = "users.sqlite3";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_TRANSACTION_TIMEOUT_MS: u64 = 30_000;

/// Database the gateway connects to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DbTarget {
    /// SQLite database file, created when missing.
    File { path: PathBuf },
    /// Private in-memory database, gone once the connection closes.
    Memory,
}

impl Default for DbTarget {
    fn default() -> Self {
        Self::File {
            path: PathBuf::from(DEFAULT_DB_FILE_NAME),
        }
    }
}

/// Connection target and timeouts for the users gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub target: DbTarget,
    /// SQLite busy handler wait for file locks held elsewhere.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Maximum wait to acquire the shared connection.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Deadline for a single statement.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
    /// Deadline for a whole batch insert transaction.
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            target: DbTarget::default(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            statement_timeout_ms: DEFAULT_STATEMENT_TIMEOUT_MS,
            transaction_timeout_ms: DEFAULT_TRANSACTION_TIMEOUT_MS,
        }
    }
}

impl GatewayConfig {
    /// Default timeouts against a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            target: DbTarget::Memory,
            ..Self::default()
        }
    }

    /// Default timeouts against the given database file.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: DbTarget::File { path: path.into() },
            ..Self::default()
        }
    }

    /// Parses a JSON config document. Missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

const fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

const fn default_statement_timeout_ms() -> u64 {
    DEFAULT_STATEMENT_TIMEOUT_MS
}

const fn default_transaction_timeout_ms() -> u64 {
    DEFAULT_TRANSACTION_TIMEOUT_MS
}
