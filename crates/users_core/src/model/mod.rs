//! Domain model for the users core.
//!
//! # Responsibility
//! - Define the user record returned to callers and the insert request shape.
//! - Decode the per-user settings document into typed fields.
//!
//! # Invariants
//! - A `User` always carries a store-assigned `UserId`.

pub mod user;
