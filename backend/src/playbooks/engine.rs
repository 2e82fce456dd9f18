use chrono::Utc;
use std::sync::Arc;
use tend_shared::Customer;

use crate::error::AppError;
use crate::playbooks::defaults;
use crate::playbooks::executor::{ExecutionResult, PlaybookExecutor};
use crate::playbooks::store::PlaybookStore;

/// Entry point into the automation core: evaluates every enabled
/// playbook against a customer snapshot and runs the ones that match.
pub struct PlaybookEngine {
    store: Arc<dyn PlaybookStore>,
    executor: PlaybookExecutor,
}

impl PlaybookEngine {
    pub fn new(store: Arc<dyn PlaybookStore>, executor: PlaybookExecutor) -> Self {
        Self { store, executor }
    }

    /// Check all enabled playbooks against a customer's current state.
    ///
    /// Called from the customer-mutation path after the write commits.
    /// Never fails the caller: a store outage aborts this cycle with a
    /// log line, and a failure in one playbook does not stop the rest.
    pub async fn check_triggers(&self, customer: &Customer) -> Vec<ExecutionResult> {
        let playbooks = match self.store.list_enabled().await {
            Ok(playbooks) => playbooks,
            Err(err) => {
                tracing::error!(
                    "Playbook check aborted for customer '{}': {}",
                    customer.account_name,
                    err
                );
                return Vec::new();
            }
        };

        let now = Utc::now();
        let mut results = Vec::new();

        // Playbooks run sequentially so execution order and audit order
        // stay aligned with priority order.
        for playbook in &playbooks {
            if !playbook.trigger.matches(customer, now) {
                continue;
            }

            tracing::info!(
                "Playbook '{}' triggered for customer '{}'",
                playbook.name,
                customer.account_name
            );

            match self.executor.execute(playbook, customer).await {
                Ok(result) => {
                    if result.failed_count() > 0 {
                        tracing::warn!(
                            "Playbook '{}' completed with {} failed action(s)",
                            playbook.name,
                            result.failed_count()
                        );
                    }
                    results.push(result);
                }
                Err(err) => {
                    tracing::error!(
                        "Playbook '{}' failed for customer '{}': {}",
                        playbook.name,
                        customer.account_name,
                        err
                    );
                }
            }
        }

        results
    }

    /// Seed the built-in playbooks. Safe to call on every startup.
    pub async fn install_defaults(&self) -> Result<(), AppError> {
        defaults::install_defaults(self.store.as_ref()).await
    }
}
