//! Shared fixtures for leadflow-delivery integration tests.
//!
//! Provides a capturing wiremock responder and sample payload builders so
//! tests can inspect exactly what went out on the wire.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;
use wiremock::{Request, Respond, ResponseTemplate};

use leadflow_delivery::payload::{AnswerSnapshot, AnswerValue, SubmissionMeta};

/// A captured HTTP request with body and headers.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl CapturedRequest {
    /// Parse the body as JSON.
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("captured body is JSON")
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }
}

/// A wiremock responder that captures incoming requests and replies with a
/// fixed status.
#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    response_code: u16,
}

impl CaptureResponder {
    /// Capture requests and return 200 OK.
    pub fn new() -> Self {
        Self::with_status(200)
    }

    /// Capture requests and return the given status.
    pub fn with_status(response_code: u16) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            response_code,
        }
    }

    /// Number of requests captured so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("lock").len()
    }

    /// Snapshot of all captured requests.
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let headers = request
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        self.requests.lock().expect("lock").push(CapturedRequest {
            body: request.body.clone(),
            headers,
        });

        ResponseTemplate::new(self.response_code).set_body_string("ok")
    }
}

/// A text answer snapshot.
pub fn text_answer(key: &str, label: &str, value: &str) -> AnswerSnapshot {
    AnswerSnapshot {
        question_key: key.to_string(),
        question_label: label.to_string(),
        question_type: "text".to_string(),
        value: AnswerValue::Text(value.to_string()),
    }
}

/// A small realistic answer set.
pub fn sample_answers() -> BTreeMap<String, AnswerSnapshot> {
    BTreeMap::from([
        (
            "email".to_string(),
            text_answer("email", "Work email", "ada@example.com"),
        ),
        (
            "name".to_string(),
            text_answer("name", "Full name", "Ada Lovelace"),
        ),
    ])
}

/// A metadata bag for the given form and submission ids.
pub fn sample_meta(form_id: Uuid, submission_id: Uuid) -> SubmissionMeta {
    SubmissionMeta {
        submission_id,
        form_id,
        form_slug: "contact-us".to_string(),
        form_name: "Contact Us".to_string(),
        ip: Some("203.0.113.7".to_string()),
        user_agent: Some("Mozilla/5.0".to_string()),
        referrer: Some("https://example.com/pricing".to_string()),
        utm: Some(BTreeMap::from([
            ("source".to_string(), "google".to_string()),
            ("medium".to_string(), "cpc".to_string()),
        ])),
        created_at: Utc::now(),
    }
}
