//! Delivery services: eligibility, CRM distribution, webhook dispatch.

pub mod dispatcher;
pub mod distributor;
pub mod eligibility;

/// Maximum characters of a downstream response body stored on a delivery
/// record.
pub(crate) const RESPONSE_BODY_MAX_CHARS: usize = 2000;

/// Truncate a response body for storage.
pub(crate) fn truncate_response(body: &str) -> String {
    body.chars().take(RESPONSE_BODY_MAX_CHARS).collect()
}
