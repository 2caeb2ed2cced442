//! Webhook delivery audit records.
//!
//! One row per (form, submission) delivery attempt sequence. The row is
//! mutated in place across retries until it reaches a terminal state:
//! success, or three exhausted attempts. `next_attempt_at` is the
//! persisted retry schedule; a null value means no further retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// A webhook delivery row.
///
/// Invariants: `attempts <= 3`; `success == true` implies
/// `next_attempt_at` is null.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub form_id: Uuid,
    pub submission_id: Uuid,
    pub url: String,
    /// Snapshot of the outbound JSON body, captured at enqueue time.
    pub request_body: serde_json::Value,
    pub response_status: Option<i32>,
    pub response_body: Option<String>,
    pub success: bool,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a delivery row.
#[derive(Debug, Clone)]
pub struct CreateWebhookDelivery {
    pub form_id: Uuid,
    pub submission_id: Uuid,
    pub url: String,
    pub request_body: serde_json::Value,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl WebhookDelivery {
    /// Create a delivery row with `attempts = 0`.
    pub async fn create(pool: &PgPool, input: CreateWebhookDelivery) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO webhook_deliveries
                (form_id, submission_id, url, request_body, next_attempt_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(input.form_id)
        .bind(input.submission_id)
        .bind(&input.url)
        .bind(&input.request_body)
        .bind(input.next_attempt_at)
        .fetch_one(pool)
        .await
    }

    /// Load a delivery by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM webhook_deliveries WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Mark a delivery successful: terminal state, no further retries.
    ///
    /// Clears `last_error` and `next_attempt_at`.
    pub async fn mark_success(
        pool: &PgPool,
        id: Uuid,
        attempts: i32,
        response_status: i32,
        response_body: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET success = TRUE,
                attempts = $2,
                response_status = $3,
                response_body = $4,
                last_error = NULL,
                next_attempt_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempts)
        .bind(response_status)
        .bind(response_body)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt.
    ///
    /// Stores the error and the next retry time (null when the attempt
    /// budget is exhausted) and clears the stored response fields.
    pub async fn mark_failed(
        pool: &PgPool,
        id: Uuid,
        attempts: i32,
        last_error: &str,
        next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET success = FALSE,
                attempts = $2,
                last_error = $3,
                next_attempt_at = $4,
                response_status = NULL,
                response_body = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempts)
        .bind(last_error)
        .bind(next_attempt_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// List deliveries whose retry is due: not successful, attempt budget
    /// remaining, and `next_attempt_at <= now`.
    ///
    /// This feeds the recovery sweep that re-triggers deliveries whose
    /// in-process timer was lost to a restart.
    pub async fn list_due(
        pool: &PgPool,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhook_deliveries
            WHERE success = FALSE
              AND attempts < $2
              AND next_attempt_at IS NOT NULL
              AND next_attempt_at <= $1
            ORDER BY next_attempt_at
            "#,
        )
        .bind(now)
        .bind(max_attempts)
        .fetch_all(pool)
        .await
    }

    /// List deliveries for a submission, newest first (admin diagnostics).
    pub async fn list_for_submission(
        pool: &PgPool,
        submission_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM webhook_deliveries
            WHERE submission_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(submission_id)
        .fetch_all(pool)
        .await
    }
}
