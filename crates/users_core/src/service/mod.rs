//! Core use-case services.
//!
//! # Responsibility
//! - Turn gateway primitives into caller-facing user operations.
//! - Own transaction scope for multi-row writes.

pub mod user_service;
