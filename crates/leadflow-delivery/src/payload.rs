//! Delivery payload types and the CRM field-mapping builder.
//!
//! The webhook payload shape is a wire contract consumed by external
//! endpoints; field names are camelCase and must not change. CRM payloads
//! are flat objects built from a configured field mapping, with a reserved
//! `_meta.*` namespace for submission metadata.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved prefix routing a mapping entry to submission metadata instead
/// of an answer.
pub const META_PREFIX: &str = "_meta.";

/// A captured answer value.
///
/// Submitted values are one of a small set of shapes; anything else is
/// rejected upstream at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Text(String),
    List(Vec<String>),
    Null,
}

impl AnswerValue {
    /// The raw JSON value as it appears in outbound payloads.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AnswerValue::Bool(b) => serde_json::Value::Bool(*b),
            AnswerValue::Text(s) => serde_json::Value::String(s.clone()),
            AnswerValue::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
            AnswerValue::Null => serde_json::Value::Null,
        }
    }
}

/// An answer keyed by question key, snapshotting the question's label and
/// type at submission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSnapshot {
    pub question_key: String,
    pub question_label: String,
    pub question_type: String,
    pub value: AnswerValue,
}

/// The submission metadata bag handed to the delivery services.
#[derive(Debug, Clone)]
pub struct SubmissionMeta {
    pub submission_id: Uuid,
    pub form_id: Uuid,
    pub form_slug: String,
    pub form_name: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub utm: Option<BTreeMap<String, String>>,
    pub created_at: DateTime<Utc>,
}

/// The `meta` section of the webhook payload (wire contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub utm: Option<BTreeMap<String, String>>,
    pub created_at: DateTime<Utc>,
}

/// The webhook payload (wire contract — preserve field names exactly).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub form_id: Uuid,
    pub form_slug: String,
    pub form_name: String,
    pub submission_id: Uuid,
    pub answers: BTreeMap<String, AnswerSnapshot>,
    pub meta: WebhookMeta,
}

impl WebhookPayload {
    /// Build the `lead.created` payload for a submission.
    pub fn lead_created(answers: BTreeMap<String, AnswerSnapshot>, meta: &SubmissionMeta) -> Self {
        Self {
            event: "lead.created".to_string(),
            timestamp: Utc::now(),
            form_id: meta.form_id,
            form_slug: meta.form_slug.clone(),
            form_name: meta.form_name.clone(),
            submission_id: meta.submission_id,
            answers,
            meta: WebhookMeta {
                ip: meta.ip.clone(),
                user_agent: meta.user_agent.clone(),
                referrer: meta.referrer.clone(),
                utm: meta.utm.clone(),
                created_at: meta.created_at,
            },
        }
    }
}

/// Build the flat CRM request body from a client's field mapping.
///
/// An empty mapping is an identity passthrough: every answer key maps to
/// itself. Mapping entries whose form-field name carries the [`META_PREFIX`]
/// resolve against the metadata bag; all others resolve against the answer
/// values. Entries that resolve to nothing are skipped, so the output is
/// sparse rather than null-padded.
pub fn build_request_body(
    field_mapping: &BTreeMap<String, String>,
    answers: &BTreeMap<String, AnswerSnapshot>,
    meta: &SubmissionMeta,
) -> serde_json::Map<String, serde_json::Value> {
    let mut body = serde_json::Map::new();

    if field_mapping.is_empty() {
        for (key, answer) in answers {
            body.insert(key.clone(), answer.value.to_json());
        }
        return body;
    }

    for (form_field, crm_field) in field_mapping {
        if let Some(suffix) = form_field.strip_prefix(META_PREFIX) {
            if let Some(value) = resolve_meta_field(suffix, meta) {
                body.insert(crm_field.clone(), serde_json::Value::String(value));
            }
        } else if let Some(answer) = answers.get(form_field) {
            body.insert(crm_field.clone(), answer.value.to_json());
        }
    }

    body
}

/// Resolve a `_meta.*` suffix against the metadata bag.
///
/// Unknown suffixes and absent optional fields resolve to nothing.
fn resolve_meta_field(suffix: &str, meta: &SubmissionMeta) -> Option<String> {
    match suffix {
        "submissionId" => Some(meta.submission_id.to_string()),
        "formId" => Some(meta.form_id.to_string()),
        "formSlug" => Some(meta.form_slug.clone()),
        "formName" => Some(meta.form_name.clone()),
        "ip" => meta.ip.clone(),
        "userAgent" => meta.user_agent.clone(),
        "referrer" => meta.referrer.clone(),
        "utm_source" => meta.utm.as_ref().and_then(|u| u.get("source").cloned()),
        "utm_medium" => meta.utm.as_ref().and_then(|u| u.get("medium").cloned()),
        "utm_campaign" => meta.utm.as_ref().and_then(|u| u.get("campaign").cloned()),
        "createdAt" => Some(meta.created_at.to_rfc3339()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
