//! Submission and answer-snapshot models.
//!
//! A submission and its answers are created atomically in one transaction
//! and never mutated afterwards; they disappear only through the cascading
//! delete of their form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// One form fill.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub form_id: Uuid,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    /// UTM attribution as an optional string map (source/medium/campaign/...).
    pub utm: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// One answer, keyed by question key, snapshotting the question's label and
/// type at submission time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubmissionAnswer {
    pub id: Uuid,
    pub submission_id: Uuid,
    pub question_key: String,
    pub question_label: String,
    pub question_type: String,
    pub value: serde_json::Value,
}

/// Input for creating a submission.
#[derive(Debug, Clone)]
pub struct CreateSubmission {
    pub form_id: Uuid,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub utm: Option<serde_json::Value>,
}

/// Input for one answer row.
#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub question_key: String,
    pub question_label: String,
    pub question_type: String,
    pub value: serde_json::Value,
}

impl Submission {
    /// Create a submission with its answers in a single transaction.
    pub async fn create(
        pool: &PgPool,
        input: CreateSubmission,
        answers: Vec<NewAnswer>,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let submission: Self = sqlx::query_as(
            r#"
            INSERT INTO submissions (form_id, ip, user_agent, referrer, utm)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(input.form_id)
        .bind(&input.ip)
        .bind(&input.user_agent)
        .bind(&input.referrer)
        .bind(&input.utm)
        .fetch_one(&mut *tx)
        .await?;

        for answer in &answers {
            sqlx::query(
                r#"
                INSERT INTO submission_answers
                    (submission_id, question_key, question_label, question_type, value)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(submission.id)
            .bind(&answer.question_key)
            .bind(&answer.question_label)
            .bind(&answer.question_type)
            .bind(&answer.value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(submission)
    }

    /// Load a submission by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Load all answers for a submission.
    pub async fn find_answers(
        pool: &PgPool,
        submission_id: Uuid,
    ) -> Result<Vec<SubmissionAnswer>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM submission_answers
            WHERE submission_id = $1
            ORDER BY question_key
            "#,
        )
        .bind(submission_id)
        .fetch_all(pool)
        .await
    }
}
