use crate::error::AppError;
use crate::playbooks::model::{
    Action, CreateTaskConfig, NewPlaybook, SendEmailConfig, SendSlackConfig, Trigger,
    TriggerWebhookConfig,
};
use crate::playbooks::store::PlaybookStore;

/// The playbooks every fresh installation ships with.
pub fn default_playbooks() -> Vec<NewPlaybook> {
    vec![
        NewPlaybook {
            name: "High Churn Risk Alert".to_string(),
            description: Some(
                "Escalates when a customer's health score signals churn risk".to_string(),
            ),
            trigger: Trigger::ChurnRiskHigh {},
            actions: vec![
                Action::CreateTask(CreateTaskConfig {
                    title: Some("URGENT: High churn risk detected".to_string()),
                    description: Some(
                        "Customer showing high churn risk. Schedule intervention call immediately."
                            .to_string(),
                    ),
                    priority: Some("urgent".to_string()),
                    due_hours: Some(24),
                }),
                Action::SendSlack(SendSlackConfig {
                    channel: Some("#customer-success".to_string()),
                    message: Some("High churn risk alert".to_string()),
                }),
                Action::TriggerWebhook(TriggerWebhookConfig {
                    event: Some("customer.churn_risk.high".to_string()),
                    url: None,
                    data: serde_json::Value::Null,
                }),
            ],
            enabled: true,
            priority: 1,
        },
        NewPlaybook {
            name: "New Customer Onboarding".to_string(),
            description: Some("Kicks off onboarding when an account goes active".to_string()),
            trigger: Trigger::StatusChanged {
                status: "Active".to_string(),
            },
            actions: vec![
                Action::CreateTask(CreateTaskConfig {
                    title: Some("Schedule kickoff call".to_string()),
                    description: None,
                    priority: Some("high".to_string()),
                    due_hours: Some(24),
                }),
                Action::SendEmail(SendEmailConfig {
                    template: Some("welcome_email".to_string()),
                    subject: None,
                }),
                Action::CreateTask(CreateTaskConfig {
                    title: Some("30-day check-in".to_string()),
                    description: None,
                    priority: Some("medium".to_string()),
                    due_hours: Some(720),
                }),
            ],
            enabled: true,
            priority: 2,
        },
    ]
}

/// Insert the default playbooks, skipping any that already exist by
/// name. One failed insert is logged and does not stop the others.
pub async fn install_defaults(store: &dyn PlaybookStore) -> Result<(), AppError> {
    for playbook in default_playbooks() {
        match store.insert_if_absent(&playbook).await {
            Ok(true) => tracing::info!("Installed default playbook '{}'", playbook.name),
            Ok(false) => {
                tracing::debug!("Default playbook '{}' already present", playbook.name)
            }
            Err(err) => {
                tracing::error!(
                    "Failed to install default playbook '{}': {}",
                    playbook.name,
                    err
                );
            }
        }
    }
    Ok(())
}
