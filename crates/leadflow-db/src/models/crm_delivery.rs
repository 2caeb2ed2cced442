//! CRM delivery audit records.
//!
//! One row per distribution attempt to a specific client for a specific
//! submission. The row is created before the outbound request is sent so a
//! crash mid-request still leaves an auditable attempt, then finalized once
//! with the outcome. Successful rows are what quota accounting counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A CRM delivery row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CrmDelivery {
    pub id: Uuid,
    pub client_id: Uuid,
    pub form_id: Uuid,
    pub submission_id: Uuid,
    pub request_body: serde_json::Value,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub success: bool,
    /// Set to 1 on completion; distribution makes exactly one attempt.
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a pending delivery row.
#[derive(Debug, Clone)]
pub struct CreateCrmDelivery {
    pub client_id: Uuid,
    pub form_id: Uuid,
    pub submission_id: Uuid,
    pub request_body: serde_json::Value,
}

impl CrmDelivery {
    /// Create a pending delivery row capturing the outbound request body.
    pub async fn create(pool: &PgPool, input: CreateCrmDelivery) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO crm_deliveries (client_id, form_id, submission_id, request_body)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(input.client_id)
        .bind(input.form_id)
        .bind(input.submission_id)
        .bind(&input.request_body)
        .fetch_one(pool)
        .await
    }

    /// Finalize the row as successful, attempts = 1.
    pub async fn mark_success(
        pool: &PgPool,
        id: Uuid,
        response_status: i32,
        response_body: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE crm_deliveries
            SET success = TRUE,
                attempts = 1,
                response_status = $2,
                response_body = $3,
                last_error = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(response_status)
        .bind(response_body)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Finalize the row as failed, attempts = 1. No retry is scheduled at
    /// this layer.
    pub async fn mark_failed(
        pool: &PgPool,
        id: Uuid,
        last_error: &str,
        response_status: Option<i32>,
        response_body: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE crm_deliveries
            SET success = FALSE,
                attempts = 1,
                last_error = $2,
                response_status = $3,
                response_body = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(last_error)
        .bind(response_status)
        .bind(response_body)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Count successful deliveries to a client created at or after `since`.
    ///
    /// This is the quota-window count: for a rule of N leads per D days,
    /// `since = now - D days`.
    pub async fn count_successful_since(
        pool: &PgPool,
        client_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM crm_deliveries
            WHERE client_id = $1
              AND success = TRUE
              AND created_at >= $2
            "#,
        )
        .bind(client_id)
        .bind(since)
        .fetch_one(pool)
        .await
    }

    /// List deliveries for a client, newest first (admin diagnostics).
    pub async fn list_for_client(
        pool: &PgPool,
        client_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM crm_deliveries
            WHERE client_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(client_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
