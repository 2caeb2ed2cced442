//! Connection pool construction.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::DbError;

/// A thin wrapper around a Postgres connection pool.
///
/// Model methods take `&PgPool` directly; this type exists to centralize
/// connection setup and migration running.
#[derive(Clone)]
pub struct DbPool {
    inner: PgPool,
}

impl DbPool {
    /// Connect to the database with sensible pool defaults.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::ConnectionFailed`] if the database is unreachable
    /// or the credentials are invalid.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        Self::connect_with_size(database_url, 10).await
    }

    /// Connect with an explicit maximum pool size.
    pub async fn connect_with_size(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        let inner = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;

        Ok(Self { inner })
    }

    /// Access the underlying `sqlx` pool.
    pub fn inner(&self) -> &PgPool {
        &self.inner
    }
}
