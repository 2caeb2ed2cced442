//! Quota and eligibility engine.
//!
//! Given a form, computes the ordered set of CRM clients allowed to receive
//! its next lead: enabled clients, narrowed by the form's allowlist when one
//! exists, with every quota rule holding headroom, sorted by effective
//! priority descending.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DeliveryError;
use leadflow_db::models::{CrmClient, CrmDelivery, CrmQuota, FormDistributionClient};

/// Headroom snapshot for one quota rule, used for observability and the
/// admin UI, not for selection.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QuotaStatus {
    pub quota_id: Uuid,
    pub lead_limit: i32,
    pub period_days: i32,
    /// Successful deliveries inside the trailing window.
    pub used: i64,
    pub remaining: i64,
}

impl QuotaStatus {
    /// A rule is satisfied while it still has headroom.
    pub fn satisfied(&self) -> bool {
        self.remaining > 0
    }
}

/// An eligible client with its computed priority and quota snapshots.
#[derive(Debug, Clone)]
pub struct EligibleClient {
    pub client: CrmClient,
    pub effective_priority: i32,
    pub quota_status: Vec<QuotaStatus>,
}

/// A client under evaluation, before the quota filter and sort.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub client: CrmClient,
    pub quota_status: Vec<QuotaStatus>,
    /// Per-form priority override from the allowlist row, when present.
    pub priority_override: Option<i32>,
}

/// Apply the eligibility policy to evaluated candidates.
///
/// A candidate survives iff it has no quota rules or every rule is
/// individually satisfied (conjunctive: one exhausted daily rule excludes a
/// client whose monthly rule still has headroom). Survivors are ordered by
/// effective priority descending; the sort is stable, so ties keep load
/// order, making selection deterministic.
pub fn rank_eligible(candidates: Vec<Candidate>) -> Vec<EligibleClient> {
    let mut eligible: Vec<EligibleClient> = candidates
        .into_iter()
        .filter(|c| c.quota_status.iter().all(QuotaStatus::satisfied))
        .map(|c| EligibleClient {
            effective_priority: c.priority_override.unwrap_or(c.client.priority),
            client: c.client,
            quota_status: c.quota_status,
        })
        .collect();

    eligible.sort_by_key(|c| std::cmp::Reverse(c.effective_priority));
    eligible
}

/// Computes per-form client eligibility from live delivery counts.
#[derive(Clone)]
pub struct EligibilityEngine {
    pool: PgPool,
}

impl EligibilityEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Compute the ordered eligible clients for a form.
    ///
    /// Quota counts are read at call time with no reservation: two
    /// concurrent distributions racing the same tight quota can both see
    /// headroom and overshoot the limit by the width of the race window.
    /// This is a deliberate best-effort trade-off, not a linearizable
    /// reservation system.
    pub async fn eligible_clients(
        &self,
        form_id: Uuid,
    ) -> Result<Vec<EligibleClient>, DeliveryError> {
        let clients = CrmClient::list_enabled(&self.pool).await?;

        let allowlist = FormDistributionClient::list_enabled_for_form(&self.pool, form_id).await?;
        let overrides: HashMap<Uuid, Option<i32>> = allowlist
            .iter()
            .map(|row| (row.client_id, row.priority_override))
            .collect();

        // Zero allowlist rows = open pool; otherwise only listed clients.
        let selected: Vec<CrmClient> = if overrides.is_empty() {
            clients
        } else {
            clients
                .into_iter()
                .filter(|c| overrides.contains_key(&c.id))
                .collect()
        };

        if selected.is_empty() {
            return Ok(Vec::new());
        }

        let client_ids: Vec<Uuid> = selected.iter().map(|c| c.id).collect();
        let quotas = CrmQuota::list_for_clients(&self.pool, &client_ids).await?;
        let mut quotas_by_client: HashMap<Uuid, Vec<CrmQuota>> = HashMap::new();
        for quota in quotas {
            quotas_by_client.entry(quota.client_id).or_default().push(quota);
        }

        let mut candidates = Vec::with_capacity(selected.len());
        for client in selected {
            let rules = quotas_by_client.remove(&client.id).unwrap_or_default();
            match self.evaluate_quotas(client.id, &rules).await {
                Ok(quota_status) => {
                    let priority_override = overrides.get(&client.id).copied().flatten();
                    candidates.push(Candidate {
                        client,
                        quota_status,
                        priority_override,
                    });
                }
                // A client that vanished mid-check is excluded, not fatal.
                Err(sqlx::Error::RowNotFound) => {
                    tracing::warn!(
                        target: "lead_delivery",
                        client_id = %client.id,
                        "Skipping client that disappeared during quota evaluation"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(rank_eligible(candidates))
    }

    /// Evaluate every quota rule for a client against the trailing window.
    async fn evaluate_quotas(
        &self,
        client_id: Uuid,
        rules: &[CrmQuota],
    ) -> Result<Vec<QuotaStatus>, sqlx::Error> {
        let now = Utc::now();
        let mut statuses = Vec::with_capacity(rules.len());

        for rule in rules {
            let since = now - Duration::days(i64::from(rule.period_days));
            let used = CrmDelivery::count_successful_since(&self.pool, client_id, since).await?;
            statuses.push(QuotaStatus {
                quota_id: rule.id,
                lead_limit: rule.lead_limit,
                period_days: rule.period_days,
                used,
                remaining: i64::from(rule.lead_limit) - used,
            });
        }

        Ok(statuses)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
