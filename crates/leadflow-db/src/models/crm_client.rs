//! CRM client configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A configured outbound CRM/lead-sink integration.
///
/// `headers` and `field_mapping` are JSONB string maps; `http_method` is
/// stored as text (POST/PUT/PATCH) and parsed leniently at send time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CrmClient {
    pub id: Uuid,
    pub name: String,
    pub api_url: String,
    pub api_key: Option<String>,
    /// Reserved for request signing; unused today.
    pub api_secret: Option<String>,
    pub http_method: String,
    pub headers: Option<serde_json::Value>,
    pub field_mapping: Option<serde_json::Value>,
    pub enabled: bool,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CrmClient {
    /// Load all enabled clients in stable load order (creation order).
    pub async fn list_enabled(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM crm_clients
            WHERE enabled = TRUE
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Load a client by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM crm_clients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
