//! Outbound lead delivery for the leadflow form builder.
//!
//! Takes a newly captured submission and gets it to its external consumers:
//! a single configured webhook per form (with bounded retries and a durable
//! recovery sweep), or exactly one CRM client picked from a competing pool
//! under rolling-window quotas and priority ordering. Every attempt leaves
//! an auditable delivery record.

pub mod crypto;
pub mod error;
pub mod payload;
pub mod services;
pub mod validation;
pub mod worker;

pub use error::DeliveryError;
pub use payload::{AnswerSnapshot, AnswerValue, SubmissionMeta, WebhookPayload};
pub use services::dispatcher::{TestSendOutcome, WebhookDispatcher};
pub use services::distributor::{CrmDistributor, DistributionOutcome};
pub use services::eligibility::{EligibilityEngine, EligibleClient, QuotaStatus};
pub use worker::RetrySweeper;
