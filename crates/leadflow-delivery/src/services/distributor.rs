//! CRM distribution orchestrator.
//!
//! Routes one submission to at most one CRM client: the highest effective
//! priority among the eligible pool. Builds the mapped payload, writes the
//! audit record before sending, and performs a single delivery attempt with
//! no retry layer.

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::payload::{build_request_body, AnswerSnapshot, SubmissionMeta};
use crate::services::eligibility::EligibilityEngine;
use crate::services::truncate_response;
use leadflow_db::models::{CreateCrmDelivery, CrmClient, CrmDelivery};

/// Outcome of one distribution call.
///
/// `NoEligibleClients` is an expected business outcome (empty pool or every
/// quota exhausted), distinct from a delivery failure: no HTTP call is made
/// and no record is written.
#[derive(Debug, Clone)]
pub enum DistributionOutcome {
    Delivered {
        client_id: Uuid,
        client_name: String,
        delivery_id: Uuid,
        response_status: u16,
    },
    Failed {
        client_id: Uuid,
        client_name: String,
        delivery_id: Uuid,
        error: String,
        response_status: Option<u16>,
    },
    NoEligibleClients,
}

/// Service routing submissions to CRM clients.
#[derive(Clone)]
pub struct CrmDistributor {
    pool: PgPool,
    http_client: Client,
    eligibility: EligibilityEngine,
}

impl CrmDistributor {
    /// Create a distributor with a shared HTTP client.
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
            eligibility: EligibilityEngine::new(pool.clone()),
            pool,
            http_client,
        })
    }

    /// Distribute a submission to the winning CRM client.
    ///
    /// Not idempotent: each call creates a fresh delivery record and
    /// re-evaluates eligibility, so callers must ensure at-most-once
    /// invocation per submission.
    pub async fn distribute(
        &self,
        form_id: Uuid,
        submission_id: Uuid,
        answers: &BTreeMap<String, AnswerSnapshot>,
        meta: &SubmissionMeta,
    ) -> Result<DistributionOutcome, DeliveryError> {
        let eligible = self.eligibility.eligible_clients(form_id).await?;

        let Some(winner) = eligible.into_iter().next() else {
            tracing::info!(
                target: "lead_delivery",
                form_id = %form_id,
                submission_id = %submission_id,
                "No eligible CRM clients for distribution"
            );
            return Ok(DistributionOutcome::NoEligibleClients);
        };
        let client = winner.client;

        let mapping = parse_field_mapping(client.field_mapping.as_ref());
        let body = build_request_body(&mapping, answers, meta);
        let request_body = serde_json::Value::Object(body);

        // The audit row is written before the request goes out so a crash
        // mid-request still leaves an auditable attempt. A persistence
        // failure here aborts the delivery: the audit trail is the source
        // of truth for quota accounting.
        let delivery = CrmDelivery::create(
            &self.pool,
            CreateCrmDelivery {
                client_id: client.id,
                form_id,
                submission_id,
                request_body: request_body.clone(),
            },
        )
        .await?;

        tracing::info!(
            target: "lead_delivery",
            form_id = %form_id,
            submission_id = %submission_id,
            client_id = %client.id,
            client_name = %client.name,
            delivery_id = %delivery.id,
            effective_priority = winner.effective_priority,
            "Distributing lead to CRM client"
        );

        self.execute_delivery(&client, &delivery, &request_body).await
    }

    /// Perform the single HTTP attempt and finalize the audit record.
    async fn execute_delivery(
        &self,
        client: &CrmClient,
        delivery: &CrmDelivery,
        request_body: &serde_json::Value,
    ) -> Result<DistributionOutcome, DeliveryError> {
        let body_bytes = serde_json::to_vec(request_body)
            .map_err(|e| DeliveryError::Internal(format!("Failed to serialize payload: {e}")))?;

        let method = parse_http_method(&client.http_method);
        let headers = build_headers(client.headers.as_ref());

        let mut request = self
            .http_client
            .request(method, &client.api_url)
            .headers(headers)
            .body(body_bytes);
        if let Some(ref api_key) = client.api_key {
            request = request.bearer_auth(api_key);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = truncate_response(&response.text().await.unwrap_or_default());

                if (200..300).contains(&status) {
                    CrmDelivery::mark_success(
                        &self.pool,
                        delivery.id,
                        i32::from(status),
                        Some(&body),
                    )
                    .await?;

                    tracing::info!(
                        target: "lead_delivery",
                        delivery_id = %delivery.id,
                        client_id = %client.id,
                        response_status = status,
                        "CRM delivery succeeded"
                    );

                    Ok(DistributionOutcome::Delivered {
                        client_id: client.id,
                        client_name: client.name.clone(),
                        delivery_id: delivery.id,
                        response_status: status,
                    })
                } else {
                    let error = format!("HTTP {status}");
                    CrmDelivery::mark_failed(
                        &self.pool,
                        delivery.id,
                        &error,
                        Some(i32::from(status)),
                        Some(&body),
                    )
                    .await?;

                    tracing::warn!(
                        target: "lead_delivery",
                        delivery_id = %delivery.id,
                        client_id = %client.id,
                        response_status = status,
                        "CRM delivery failed"
                    );

                    Ok(DistributionOutcome::Failed {
                        client_id: client.id,
                        client_name: client.name.clone(),
                        delivery_id: delivery.id,
                        error,
                        response_status: Some(status),
                    })
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

                CrmDelivery::mark_failed(&self.pool, delivery.id, &error, None, None).await?;

                tracing::warn!(
                    target: "lead_delivery",
                    delivery_id = %delivery.id,
                    client_id = %client.id,
                    error = %error,
                    "CRM delivery failed"
                );

                Ok(DistributionOutcome::Failed {
                    client_id: client.id,
                    client_name: client.name.clone(),
                    delivery_id: delivery.id,
                    error,
                    response_status: None,
                })
            }
        }
    }
}

/// Parse a configured HTTP method, defaulting to POST for anything
/// unrecognized so bad admin config cannot strand a lead.
fn parse_http_method(method: &str) -> Method {
    match method.to_ascii_uppercase().as_str() {
        "PUT" => Method::PUT,
        "PATCH" => Method::PATCH,
        _ => Method::POST,
    }
}

/// Build outbound headers: JSON content type plus the client's custom
/// headers, shallow-merged. Custom headers never override Content-Type;
/// entries that are not valid header name/value pairs are skipped.
fn build_headers(custom: Option<&serde_json::Value>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(map) = custom.and_then(|v| v.as_object()) {
        for (name, value) in map {
            if name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            let Some(value) = value.as_str() else { continue };
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
    }

    headers
}

/// Parse the JSONB field mapping into a string map, ignoring non-string
/// entries.
fn parse_field_mapping(mapping: Option<&serde_json::Value>) -> BTreeMap<String, String> {
    let Some(map) = mapping.and_then(|v| v.as_object()) else {
        return BTreeMap::new();
    };

    map.iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
