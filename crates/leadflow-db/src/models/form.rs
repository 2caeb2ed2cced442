//! Read-only view of a form's webhook configuration.
//!
//! Forms are owned by the form-builder layer; the delivery subsystem only
//! reads the fields it needs to dispatch webhooks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// The delivery-relevant slice of a form row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct FormWebhookConfig {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub webhook_enabled: bool,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FormWebhookConfig {
    /// Load the webhook configuration for a form, if the form exists.
    pub async fn find(pool: &PgPool, form_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, slug, name, webhook_enabled, webhook_url, webhook_secret, created_at
            FROM forms
            WHERE id = $1
            "#,
        )
        .bind(form_id)
        .fetch_optional(pool)
        .await
    }
}
