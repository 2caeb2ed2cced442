//! Periodic retry sweep worker.
//!
//! Runs [`WebhookDispatcher::sweep_due`] on an interval so deliveries whose
//! in-process timer was lost (process restart) are still retried once their
//! persisted `next_attempt_at` passes. The cadence is the embedder's call;
//! the loop stops when the shutdown signal flips.

use std::time::Duration;

use tokio::sync::watch;

use crate::services::dispatcher::WebhookDispatcher;

/// The recovery sweep loop.
pub struct RetrySweeper {
    dispatcher: WebhookDispatcher,
    period: Duration,
}

impl RetrySweeper {
    pub fn new(dispatcher: WebhookDispatcher, period: Duration) -> Self {
        Self { dispatcher, period }
    }

    /// Run until the shutdown signal becomes true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            target: "lead_delivery",
            period_secs = self.period.as_secs(),
            "Retry sweeper started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.dispatcher.sweep_due().await {
                        Ok(0) => {}
                        Ok(count) => {
                            tracing::info!(
                                target: "lead_delivery",
                                count,
                                "Retry sweep re-triggered due deliveries"
                            );
                        }
                        Err(e) => {
                            tracing::error!(
                                target: "lead_delivery",
                                error = %e,
                                "Retry sweep failed"
                            );
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(target: "lead_delivery", "Retry sweeper stopped");
    }
}
