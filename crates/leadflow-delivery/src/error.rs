//! Error types for the delivery subsystem.

use thiserror::Error;

/// Delivery system error variants.
///
/// Business outcomes that are expected in normal operation (a failed HTTP
/// attempt, an empty eligibility pool) are not errors; they are reported on
/// the delivery records and result types. These variants cover the cases a
/// caller must handle synchronously.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("SSRF protection: {0}")]
    SsrfDetected(String),

    #[error("Form not found")]
    FormNotFound,

    #[error("Webhook is not configured for this form")]
    WebhookNotConfigured,

    #[error("Delivery not found")]
    DeliveryNotFound,

    #[error("CRM client not found")]
    ClientNotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}
