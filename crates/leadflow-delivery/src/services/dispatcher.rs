//! Webhook retry dispatcher.
//!
//! Delivers the per-form webhook for a submission with bounded automatic
//! retries. Enqueueing is fire-and-forget relative to the caller: the
//! delivery record is created, the first attempt runs as a background task,
//! and retries are driven by per-delivery timers. `next_attempt_at` is
//! persisted on every failure so the recovery sweep can re-trigger
//! deliveries whose in-process timer was lost to a restart; the timer is an
//! optimization, the sweep is the correctness backstop.

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::crypto;
use crate::error::DeliveryError;
use crate::payload::WebhookPayload;
use crate::services::truncate_response;
use crate::validation::validate_webhook_url;
use leadflow_db::models::{CreateWebhookDelivery, FormWebhookConfig, WebhookDelivery};

/// Maximum delivery attempts per webhook delivery record.
pub const MAX_ATTEMPTS: i32 = 3;

/// Retry backoff schedule in seconds, indexed by the attempt count after
/// the failure. The last entry is reused for anything beyond the table.
const BACKOFF_SCHEDULE_SECS: [i64; 3] = [1, 5, 25];

/// Signature header attached when the form has a webhook secret.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Outcome of a synchronous test send: exactly one HTTP call, no
/// persistence.
#[derive(Debug, Clone, Serialize)]
pub struct TestSendOutcome {
    pub success: bool,
    pub status: Option<u16>,
    pub body: Option<String>,
    pub error: Option<String>,
}

/// Service delivering per-form webhooks with bounded retries.
#[derive(Clone)]
pub struct WebhookDispatcher {
    pool: PgPool,
    http_client: Client,
    allow_insecure: bool,
}

impl WebhookDispatcher {
    /// Create a dispatcher with a shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Internal` if the HTTP client cannot be built.
    pub fn new(pool: PgPool) -> Result<Self, DeliveryError> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent("leadflow-delivery/0.1")
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| DeliveryError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            pool,
            http_client,
            allow_insecure: false,
        })
    }

    /// Permit plain-HTTP and private-network destinations (dev/test only).
    pub fn with_allow_insecure(mut self, allow: bool) -> Self {
        self.allow_insecure = allow;
        self
    }

    /// Create the delivery record and trigger the first attempt in the
    /// background. Returns the delivery id without waiting for the attempt;
    /// the caller's request cycle is never blocked on delivery outcome.
    pub async fn enqueue(
        &self,
        form_id: Uuid,
        submission_id: Uuid,
        url: &str,
        payload: &WebhookPayload,
    ) -> Result<Uuid, DeliveryError> {
        validate_webhook_url(url, self.allow_insecure)?;

        let request_body = serde_json::to_value(payload)
            .map_err(|e| DeliveryError::Internal(format!("Failed to serialize payload: {e}")))?;

        let delivery = WebhookDelivery::create(
            &self.pool,
            CreateWebhookDelivery {
                form_id,
                submission_id,
                url: url.to_string(),
                request_body,
                next_attempt_at: Some(Utc::now()),
            },
        )
        .await?;

        tracing::info!(
            target: "lead_delivery",
            delivery_id = %delivery.id,
            form_id = %form_id,
            submission_id = %submission_id,
            "Webhook delivery enqueued"
        );

        let dispatcher = self.clone();
        let delivery_id = delivery.id;
        tokio::spawn(async move {
            if let Err(e) = dispatcher.execute_attempt(delivery_id).await {
                tracing::error!(
                    target: "lead_delivery",
                    delivery_id = %delivery_id,
                    error = %e,
                    "Webhook attempt task failed"
                );
            }
        });

        Ok(delivery.id)
    }

    /// Execute one delivery attempt.
    ///
    /// A no-op when the record is already successful or its attempt budget
    /// is spent, which guards against duplicate or late-scheduled timers
    /// firing after the terminal state.
    // Returns a boxed future (rather than being an `async fn`) because the
    // attempt indirectly re-spawns itself for retries; boxing breaks the
    // recursive opaque-future cycle in the `Send` bound.
    pub fn execute_attempt(
        &self,
        delivery_id: Uuid,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<(), DeliveryError>> + Send + '_>,
    > {
        Box::pin(self.execute_attempt_inner(delivery_id))
    }

    async fn execute_attempt_inner(&self, delivery_id: Uuid) -> Result<(), DeliveryError> {
        let Some(delivery) = WebhookDelivery::find_by_id(&self.pool, delivery_id).await? else {
            tracing::warn!(
                target: "lead_delivery",
                delivery_id = %delivery_id,
                "Skipping attempt for missing delivery record"
            );
            return Ok(());
        };

        if delivery.success || delivery.attempts >= MAX_ATTEMPTS {
            tracing::debug!(
                target: "lead_delivery",
                delivery_id = %delivery.id,
                success = delivery.success,
                attempts = delivery.attempts,
                "Skipping attempt for terminal delivery"
            );
            return Ok(());
        }

        // The secret lives on the form, not the delivery record, so it is
        // reloaded at attempt time and rotations take effect mid-sequence.
        let secret = match FormWebhookConfig::find(&self.pool, delivery.form_id).await? {
            Some(config) => config.webhook_secret,
            None => {
                let attempts = delivery.attempts + 1;
                WebhookDelivery::mark_failed(
                    &self.pool,
                    delivery.id,
                    attempts,
                    "Webhook configuration missing: form not found",
                    None,
                )
                .await?;
                tracing::warn!(
                    target: "lead_delivery",
                    delivery_id = %delivery.id,
                    form_id = %delivery.form_id,
                    "Abandoning webhook delivery for deleted form"
                );
                return Ok(());
            }
        };

        let body_bytes = serde_json::to_vec(&delivery.request_body)
            .map_err(|e| DeliveryError::Internal(format!("Failed to serialize body: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(ref secret) = secret {
            // Signature covers the exact bytes sent on the wire.
            let signature = crypto::sign_payload(secret, &body_bytes);
            if let Ok(value) = HeaderValue::from_str(&signature) {
                headers.insert(SIGNATURE_HEADER, value);
            }
        }

        let result = self
            .http_client
            .post(&delivery.url)
            .headers(headers)
            .body(body_bytes)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = truncate_response(&response.text().await.unwrap_or_default());

                if (200..300).contains(&status) {
                    self.handle_success(&delivery, status, &body).await
                } else {
                    self.handle_failure(&delivery, &format!("HTTP {status}")).await
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    "Request timeout (10s)".to_string()
                } else if e.is_connect() {
                    format!("Connection failed: {e}")
                } else {
                    format!("Request error: {e}")
                };
                self.handle_failure(&delivery, &error).await
            }
        }
    }

    /// Terminal success: no further attempts regardless of remaining budget.
    async fn handle_success(
        &self,
        delivery: &WebhookDelivery,
        status: u16,
        body: &str,
    ) -> Result<(), DeliveryError> {
        let attempts = delivery.attempts + 1;
        WebhookDelivery::mark_success(
            &self.pool,
            delivery.id,
            attempts,
            i32::from(status),
            Some(body),
        )
        .await?;

        tracing::info!(
            target: "lead_delivery",
            delivery_id = %delivery.id,
            submission_id = %delivery.submission_id,
            response_status = status,
            attempts,
            "Webhook delivery succeeded"
        );
        Ok(())
    }

    /// Record the failed attempt and schedule the next one while budget
    /// remains.
    async fn handle_failure(
        &self,
        delivery: &WebhookDelivery,
        error: &str,
    ) -> Result<(), DeliveryError> {
        let attempts = delivery.attempts + 1;
        let next_attempt_at = calculate_next_attempt_at(attempts, MAX_ATTEMPTS);

        WebhookDelivery::mark_failed(&self.pool, delivery.id, attempts, error, next_attempt_at)
            .await?;

        tracing::warn!(
            target: "lead_delivery",
            delivery_id = %delivery.id,
            submission_id = %delivery.submission_id,
            error = %error,
            attempts,
            has_next_retry = next_attempt_at.is_some(),
            "Webhook delivery attempt failed"
        );

        if next_attempt_at.is_some() {
            let delay = backoff_delay_secs(attempts);
            let dispatcher = self.clone();
            let delivery_id = delivery.id;
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_secs(delay as u64)).await;
                if let Err(e) = dispatcher.execute_attempt(delivery_id).await {
                    tracing::error!(
                        target: "lead_delivery",
                        delivery_id = %delivery_id,
                        error = %e,
                        "Webhook retry task failed"
                    );
                }
            });
        }

        Ok(())
    }

    /// Re-trigger every due, non-terminal delivery.
    ///
    /// The durability backstop: deliveries whose in-process retry timer was
    /// lost (process restart) are picked up here once their persisted
    /// `next_attempt_at` passes. Returns the number of deliveries swept.
    pub async fn sweep_due(&self) -> Result<usize, DeliveryError> {
        let due = WebhookDelivery::list_due(&self.pool, Utc::now(), MAX_ATTEMPTS).await?;
        let count = due.len();

        for delivery in due {
            if let Err(e) = self.execute_attempt(delivery.id).await {
                tracing::error!(
                    target: "lead_delivery",
                    delivery_id = %delivery.id,
                    error = %e,
                    "Sweep attempt failed"
                );
            }
        }

        Ok(count)
    }

    /// Send a one-shot test webhook: no persistence, no retry. Used to
    /// validate a URL/secret pair before enabling it on a form.
    pub async fn send_test(
        &self,
        url: &str,
        secret: Option<&str>,
        sample_payload: &serde_json::Value,
    ) -> Result<TestSendOutcome, DeliveryError> {
        validate_webhook_url(url, self.allow_insecure)?;

        let body_bytes = serde_json::to_vec(sample_payload)
            .map_err(|e| DeliveryError::Internal(format!("Failed to serialize payload: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(secret) = secret {
            let signature = crypto::sign_payload(secret, &body_bytes);
            if let Ok(value) = HeaderValue::from_str(&signature) {
                headers.insert(SIGNATURE_HEADER, value);
            }
        }

        match self
            .http_client
            .post(url)
            .headers(headers)
            .body(body_bytes)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = truncate_response(&response.text().await.unwrap_or_default());
                Ok(TestSendOutcome {
                    success: (200..300).contains(&status),
                    status: Some(status),
                    body: Some(body),
                    error: None,
                })
            }
            Err(e) => Ok(TestSendOutcome {
                success: false,
                status: None,
                body: None,
                error: Some(e.to_string()),
            }),
        }
    }
}

/// Delay in seconds before the attempt numbered `attempt_number` retries.
///
/// Attempt counts beyond the schedule reuse the last entry.
pub fn backoff_delay_secs(attempt_number: i32) -> i64 {
    let idx = (attempt_number - 1).max(0) as usize;
    BACKOFF_SCHEDULE_SECS
        .get(idx)
        .copied()
        .unwrap_or(BACKOFF_SCHEDULE_SECS[BACKOFF_SCHEDULE_SECS.len() - 1])
}

/// Next retry timestamp after a failure left the record at `attempt_number`
/// attempts, or `None` when the budget is exhausted.
pub fn calculate_next_attempt_at(
    attempt_number: i32,
    max_attempts: i32,
) -> Option<DateTime<Utc>> {
    if attempt_number >= max_attempts {
        return None;
    }
    Some(Utc::now() + Duration::seconds(backoff_delay_secs(attempt_number)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
