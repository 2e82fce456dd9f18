use chrono::{Duration, Utc};
use std::sync::Arc;
use tend_shared::Customer;
use uuid::Uuid;

use crate::error::AppError;
use crate::playbooks::gateways::{Gateways, NewActivity, NewTask};
use crate::playbooks::model::{Action, ActionOutcome, OutcomeStatus, Playbook};
use crate::playbooks::recorder::ExecutionRecorder;
use crate::playbooks::store::PlaybookStore;
use crate::services::email::render_automation_email;

/// Outcome summary of one playbook run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub execution_id: Uuid,
    pub playbook_id: Uuid,
    pub outcomes: Vec<ActionOutcome>,
}

impl ExecutionResult {
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .count()
    }
}

/// Runs a playbook's actions in order against the outbound gateways.
///
/// Every action is attempted exactly once; a gateway failure becomes a
/// failed outcome and the run continues. Only the final trigger-stat
/// write can propagate an error to the caller.
pub struct PlaybookExecutor {
    store: Arc<dyn PlaybookStore>,
    recorder: Arc<dyn ExecutionRecorder>,
    gateways: Gateways,
}

impl PlaybookExecutor {
    pub fn new(
        store: Arc<dyn PlaybookStore>,
        recorder: Arc<dyn ExecutionRecorder>,
        gateways: Gateways,
    ) -> Self {
        Self {
            store,
            recorder,
            gateways,
        }
    }

    pub async fn execute(
        &self,
        playbook: &Playbook,
        customer: &Customer,
    ) -> Result<ExecutionResult, AppError> {
        tracing::info!(
            "Executing playbook '{}' for customer '{}'",
            playbook.name,
            customer.account_name
        );

        let execution_id = self.recorder.start(playbook.id, customer.id).await;
        let mut outcomes = Vec::with_capacity(playbook.actions.len());

        for action in &playbook.actions {
            let outcome = match self.run_action(action, playbook, customer).await {
                Ok(()) => ActionOutcome::success(action.kind()),
                Err(err) => {
                    tracing::warn!(
                        "Action '{}' failed in playbook '{}': {}",
                        action.kind(),
                        playbook.name,
                        err
                    );
                    ActionOutcome::failed(action.kind(), err.to_string())
                }
            };
            self.recorder.append_outcome(execution_id, &outcome).await;
            outcomes.push(outcome);
        }

        self.recorder.complete(execution_id, &outcomes).await;

        // Trigger stats are the one write that must land; a failure here
        // is surfaced so the evaluator counts this playbook as failed.
        self.store.record_trigger(playbook.id).await?;

        Ok(ExecutionResult {
            execution_id,
            playbook_id: playbook.id,
            outcomes,
        })
    }

    async fn run_action(
        &self,
        action: &Action,
        playbook: &Playbook,
        customer: &Customer,
    ) -> Result<(), AppError> {
        match action {
            Action::CreateTask(config) => {
                let due_date = config
                    .due_hours
                    .map(|hours| Utc::now() + Duration::hours(hours));
                let task = NewTask {
                    customer_id: customer.id,
                    title: config
                        .title
                        .clone()
                        .unwrap_or_else(|| format!("Follow up with {}", customer.account_name)),
                    description: Some(config.description.clone().unwrap_or_else(|| {
                        format!("Created by playbook: {}", playbook.name)
                    })),
                    priority: config.priority.clone().unwrap_or_else(|| "medium".to_string()),
                    assigned_to: customer.account_owner_id,
                    due_date,
                    created_by: "system".to_string(),
                };
                self.gateways.tasks.create_task(task).await?;
                Ok(())
            }
            Action::SendEmail(config) => {
                let to = customer.primary_contact_email.as_deref().ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "Customer '{}' has no primary contact email",
                        customer.account_name
                    ))
                })?;

                let (template_subject, body) =
                    render_automation_email(config.template.as_deref(), customer);
                let subject = config.subject.clone().unwrap_or(template_subject);

                self.gateways.email.send_email(to, &subject, &body).await?;

                // Outbound mail shows up in the customer's activity feed.
                let activity = NewActivity {
                    customer_id: customer.id,
                    activity_type: "email_sent".to_string(),
                    title: format!("Automated Email: {}", subject),
                    description: Some(format!("Sent by playbook: {}", playbook.name)),
                    metadata: Some(serde_json::json!({
                        "subject": subject,
                        "template": config.template,
                        "playbook_id": playbook.id,
                    })),
                };
                if let Err(err) = self.gateways.activities.log_activity(activity).await {
                    tracing::warn!("Failed to log email activity: {}", err);
                }
                self.gateways.broadcaster.broadcast_activity(&serde_json::json!({
                    "customer_id": customer.id,
                    "activity_type": "email_sent",
                    "title": format!("Automated Email: {}", subject),
                }));
                Ok(())
            }
            Action::SendSlack(config) => {
                let message = config.message.clone().unwrap_or_else(|| {
                    format!(
                        "Playbook '{}' triggered for customer '{}'",
                        playbook.name, customer.account_name
                    )
                });
                self.gateways
                    .chat
                    .send_message(config.channel.as_deref(), &message)
                    .await
            }
            Action::UpdateStatus(config) => {
                self.gateways
                    .customers
                    .update_status(customer.id, &config.new_status)
                    .await?;

                let mut updated = customer.clone();
                updated.status = config.new_status.clone();
                self.gateways.broadcaster.broadcast_customer_update(&updated);
                Ok(())
            }
            Action::AssignCsm(config) => {
                self.gateways
                    .customers
                    .update_owner(customer.id, config.csm_id)
                    .await
            }
            Action::TriggerWebhook(config) => {
                let event = config
                    .event
                    .clone()
                    .unwrap_or_else(|| "playbook.triggered".to_string());
                let mut data = serde_json::json!({
                    "customer_id": customer.id,
                    "customer_name": customer.account_name,
                    "playbook": playbook.name,
                });
                if let serde_json::Value::Object(extra) = &config.data {
                    for (key, value) in extra {
                        data[key] = value.clone();
                    }
                }
                self.gateways
                    .webhooks
                    .post_webhook(config.url.as_deref(), &event, &data)
                    .await
            }
            Action::Unknown => {
                // Forward compatible: a kind this build doesn't know is
                // skipped, not failed.
                tracing::warn!(
                    "Skipping unrecognized action kind in playbook '{}'",
                    playbook.name
                );
                Ok(())
            }
        }
    }
}
