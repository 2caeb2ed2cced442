//! Database entity models.
//!
//! One module per table; each row struct carries its queries as inherent
//! async methods taking `&PgPool`.

pub mod crm_client;
pub mod crm_delivery;
pub mod crm_quota;
pub mod form;
pub mod form_distribution_client;
pub mod submission;
pub mod webhook_delivery;

pub use crm_client::CrmClient;
pub use crm_delivery::{CreateCrmDelivery, CrmDelivery};
pub use crm_quota::CrmQuota;
pub use form::FormWebhookConfig;
pub use form_distribution_client::FormDistributionClient;
pub use submission::{CreateSubmission, NewAnswer, Submission, SubmissionAnswer};
pub use webhook_delivery::{CreateWebhookDelivery, WebhookDelivery};
