use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tend_shared::Customer;
use uuid::Uuid;

/// Health score below which a customer counts as a churn risk.
pub const CHURN_RISK_THRESHOLD: i32 = 50;

/// A stored automation rule: one trigger, an ordered list of actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playbook {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub trigger: Trigger,
    pub actions: Vec<Action>,
    pub enabled: bool,
    pub priority: i32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub execution_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a playbook (admin API and built-in defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlaybook {
    pub name: String,
    pub description: Option<String>,
    pub trigger: Trigger,
    pub actions: Vec<Action>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: i32,
}

fn default_enabled() -> bool {
    true
}

/// Trigger condition stored as `{"type": ..., "conditions": {...}}`.
///
/// Unrecognized trigger types deserialize to `Unknown`, payload or not,
/// so one forward-compatible row cannot poison the whole evaluation
/// cycle. A known type with a malformed payload is still an error.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "conditions", rename_all = "snake_case")]
pub enum Trigger {
    ChurnRiskHigh {},
    HealthScoreDrop { threshold: i32 },
    RenewalApproaching { days: i64 },
    StatusChanged { status: String },
    Unknown,
}

// The derived adjacently-tagged deserializer cannot absorb an unknown
// tag that arrives with its payload, so the fallback is done by hand on
// the raw `type`/`conditions` shape.
impl<'de> Deserialize<'de> for Trigger {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            conditions: serde_json::Value,
        }

        #[derive(Deserialize)]
        struct HealthScoreConditions {
            threshold: i32,
        }

        #[derive(Deserialize)]
        struct RenewalConditions {
            days: i64,
        }

        #[derive(Deserialize)]
        struct StatusConditions {
            status: String,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(match raw.kind.as_str() {
            "churn_risk_high" => Trigger::ChurnRiskHigh {},
            "health_score_drop" => {
                let conditions: HealthScoreConditions =
                    serde_json::from_value(raw.conditions).map_err(serde::de::Error::custom)?;
                Trigger::HealthScoreDrop {
                    threshold: conditions.threshold,
                }
            }
            "renewal_approaching" => {
                let conditions: RenewalConditions =
                    serde_json::from_value(raw.conditions).map_err(serde::de::Error::custom)?;
                Trigger::RenewalApproaching {
                    days: conditions.days,
                }
            }
            "status_changed" => {
                let conditions: StatusConditions =
                    serde_json::from_value(raw.conditions).map_err(serde::de::Error::custom)?;
                Trigger::StatusChanged {
                    status: conditions.status,
                }
            }
            _ => Trigger::Unknown,
        })
    }
}

impl Trigger {
    /// Evaluate this trigger against a customer's current state.
    ///
    /// `now` is passed in so renewal-window checks are deterministic in
    /// tests. An `Unknown` trigger never matches.
    pub fn matches(&self, customer: &Customer, now: DateTime<Utc>) -> bool {
        match self {
            Trigger::ChurnRiskHigh {} => customer.health_score < CHURN_RISK_THRESHOLD,
            Trigger::HealthScoreDrop { threshold } => customer.health_score < *threshold,
            Trigger::RenewalApproaching { days } => match customer.renewal_date {
                Some(renewal) => {
                    let days_until = (renewal - now.date_naive()).num_days();
                    days_until <= *days
                }
                // No renewal date on file means nothing is approaching.
                None => false,
            },
            Trigger::StatusChanged { status } => customer.status == *status,
            Trigger::Unknown => false,
        }
    }
}

/// One step of a playbook, stored as `{"type": ..., "config": {...}}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum Action {
    CreateTask(CreateTaskConfig),
    SendEmail(SendEmailConfig),
    SendSlack(SendSlackConfig),
    UpdateStatus(UpdateStatusConfig),
    AssignCsm(AssignCsmConfig),
    TriggerWebhook(TriggerWebhookConfig),
    Unknown,
}

// Same hand-rolled fallback as `Trigger`: an unknown action kind maps
// to `Unknown` whether or not it carries a config, so one
// forward-compatible action never takes the rest of the list with it.
impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            config: serde_json::Value,
        }

        fn config<T, E>(value: serde_json::Value) -> Result<T, E>
        where
            T: serde::de::DeserializeOwned + Default,
            E: serde::de::Error,
        {
            if value.is_null() {
                Ok(T::default())
            } else {
                serde_json::from_value(value).map_err(E::custom)
            }
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(match raw.kind.as_str() {
            "create_task" => Action::CreateTask(config(raw.config)?),
            "send_email" => Action::SendEmail(config(raw.config)?),
            "send_slack" => Action::SendSlack(config(raw.config)?),
            "update_status" => Action::UpdateStatus(
                serde_json::from_value(raw.config).map_err(serde::de::Error::custom)?,
            ),
            "assign_csm" => Action::AssignCsm(
                serde_json::from_value(raw.config).map_err(serde::de::Error::custom)?,
            ),
            "trigger_webhook" => Action::TriggerWebhook(config(raw.config)?),
            _ => Action::Unknown,
        })
    }
}

impl Action {
    /// Stable action name used in execution outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::CreateTask(_) => "create_task",
            Action::SendEmail(_) => "send_email",
            Action::SendSlack(_) => "send_slack",
            Action::UpdateStatus(_) => "update_status",
            Action::AssignCsm(_) => "assign_csm",
            Action::TriggerWebhook(_) => "trigger_webhook",
            Action::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateTaskConfig {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    /// Hours from now until the task is due.
    pub due_hours: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SendEmailConfig {
    pub template: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SendSlackConfig {
    pub channel: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateStatusConfig {
    pub new_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignCsmConfig {
    pub csm_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TriggerWebhookConfig {
    pub event: Option<String>,
    /// Per-action override for the configured webhook destination.
    pub url: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Result of attempting one action within an execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionOutcome {
    pub action: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActionOutcome {
    pub fn success(action: &str) -> Self {
        Self {
            action: action.to_string(),
            status: OutcomeStatus::Success,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(action: &str, error: impl Into<String>) -> Self {
        Self {
            action: action.to_string(),
            status: OutcomeStatus::Failed,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// Persisted record of one playbook run against one customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookExecution {
    pub id: Uuid,
    pub playbook_id: Uuid,
    pub customer_id: Uuid,
    pub status: ExecutionStatus,
    pub actions_executed: Vec<ActionOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
        }
    }
}
