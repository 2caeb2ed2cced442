//! Rolling-window quota rules for CRM clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// One quota rule: at most `lead_limit` successful deliveries within the
/// trailing `period_days` days. A client may carry several rules at once;
/// all of them must have headroom for the client to be eligible.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CrmQuota {
    pub id: Uuid,
    pub client_id: Uuid,
    pub lead_limit: i32,
    pub period_days: i32,
    pub created_at: DateTime<Utc>,
}

impl CrmQuota {
    /// Load all quota rules for the given clients.
    pub async fn list_for_clients(
        pool: &PgPool,
        client_ids: &[Uuid],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM crm_quotas
            WHERE client_id = ANY($1)
            ORDER BY client_id, created_at
            "#,
        )
        .bind(client_ids)
        .fetch_all(pool)
        .await
    }
}
