//! Persistence layer for the leadflow lead-delivery subsystem.
//!
//! Row models and queries for submissions, webhook deliveries, CRM client
//! configuration, rolling quotas, CRM delivery audit records, and per-form
//! distribution allowlists.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::DbPool;
