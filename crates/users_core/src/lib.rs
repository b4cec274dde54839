//! Data-access core for the `Users` table.
//!
//! Layering, leaves first: `db` opens and bootstraps SQLite, `gateway` owns
//! the shared handle and runs parameterized statements, `service` exposes
//! the caller-facing reads and the transactional batch insert.

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod service;

pub use config::{DbTarget, GatewayConfig};
pub use gateway::connection::{ConnectionGuard, SharedConnection};
pub use gateway::user_gateway::{SqliteUserGateway, UserGateway};
pub use gateway::{StoreError, StoreResult, TimeoutScope};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::user::{decode_settings_key, NewUser, User, UserId};
pub use service::user_service::{
    BatchInsertError, ServiceError, ServiceResult, UserService, LIMIT,
};
