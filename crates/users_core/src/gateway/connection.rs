//! Lazily opened, process-shared SQLite handle.
//!
//! # Invariants
//! - The handle is opened at most once per `SharedConnection`; concurrent
//!   first callers block on the same initialization.
//! - A failed open leaves the cell empty so the next call retries.
//! - Exactly one caller uses the handle at a time, and nobody waits longer
//!   than the configured lock timeout.

use crate::config::GatewayConfig;
use crate::db::open_with_config;
use crate::gateway::{StoreError, StoreResult};
use log::{info, warn};
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;

static GLOBAL: Lazy<SharedConnection> =
    Lazy::new(|| SharedConnection::new(GatewayConfig::default()));

/// Exclusive access to the shared handle. Released on drop.
pub type ConnectionGuard<'a> = MutexGuard<'a, Connection>;

/// Owner of the single database handle used by gateway and service.
pub struct SharedConnection {
    config: GatewayConfig,
    handle: OnceCell<Mutex<Connection>>,
}

impl SharedConnection {
    /// Creates an owner that opens `config.target` on first use.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            handle: OnceCell::new(),
        }
    }

    /// Process-wide instance bound to the default connection target.
    pub fn global() -> &'static SharedConnection {
        &GLOBAL
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Whether the handle has been opened yet.
    pub fn is_open(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Returns the shared handle, opening it on first call.
    ///
    /// # Errors
    /// - `StoreError::Db` when the database cannot be opened or bootstrapped.
    /// - `StoreError::Busy` when another caller keeps the handle past the
    ///   lock timeout.
    pub fn connection(&self) -> StoreResult<ConnectionGuard<'_>> {
        let handle = self.handle.get_or_try_init(|| -> StoreResult<Mutex<Connection>> {
            let conn = open_with_config(&self.config)?;
            info!("event=connection_init module=gateway status=ok");
            Ok(Mutex::new(conn))
        })?;

        let lock_timeout = self.config.lock_timeout();
        handle.try_lock_for(lock_timeout).ok_or_else(|| {
            let waited_ms = duration_ms(lock_timeout);
            warn!("event=connection_lock module=gateway status=busy waited_ms={waited_ms}");
            StoreError::Busy { waited_ms }
        })
    }
}

pub(crate) fn duration_ms(value: std::time::Duration) -> u64 {
    u64::try_from(value.as_millis()).unwrap_or(u64::MAX)
}
