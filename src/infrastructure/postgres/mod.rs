//! PostgreSQL persistence module.
//!
//! Provides connection pooling for the PostgreSQL store backend.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
