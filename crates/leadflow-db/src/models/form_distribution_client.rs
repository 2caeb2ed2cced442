//! Per-form distribution allowlist rows.
//!
//! A form with zero rows here draws from the open pool of all enabled CRM
//! clients; a form with at least one row restricts distribution to the
//! listed (and enabled) clients, optionally overriding their priority.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// One allowlist row joining a form to a CRM client.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FormDistributionClient {
    pub id: Uuid,
    pub form_id: Uuid,
    pub client_id: Uuid,
    /// When set, replaces the client's own priority for this form.
    pub priority_override: Option<i32>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl FormDistributionClient {
    /// Load the enabled allowlist rows for a form.
    pub async fn list_enabled_for_form(
        pool: &PgPool,
        form_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM form_distribution_clients
            WHERE form_id = $1 AND enabled = TRUE
            ORDER BY created_at
            "#,
        )
        .bind(form_id)
        .fetch_all(pool)
        .await
    }
}
