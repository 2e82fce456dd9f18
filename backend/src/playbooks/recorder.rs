use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::playbooks::model::{ActionOutcome, ExecutionStatus};

/// Audit trail for playbook runs.
///
/// Recording is best-effort by contract: a failed write is logged and
/// swallowed so bookkeeping can never abort an automation that already
/// has side effects in flight.
#[async_trait]
pub trait ExecutionRecorder: Send + Sync {
    /// Open a running execution record and return its id.
    async fn start(&self, playbook_id: Uuid, customer_id: Uuid) -> Uuid;

    /// Append one action outcome to a running execution.
    async fn append_outcome(&self, execution_id: Uuid, outcome: &ActionOutcome);

    /// Mark an execution completed with its final outcome list.
    async fn complete(&self, execution_id: Uuid, outcomes: &[ActionOutcome]);
}

pub struct PgExecutionRecorder {
    pool: PgPool,
}

impl PgExecutionRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionRecorder for PgExecutionRecorder {
    async fn start(&self, playbook_id: Uuid, customer_id: Uuid) -> Uuid {
        // Id is generated client-side so the caller gets a handle even
        // when the insert fails.
        let execution_id = Uuid::new_v4();

        let result = sqlx::query(
            r#"
            INSERT INTO playbook_executions (id, playbook_id, customer_id, status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(execution_id)
        .bind(playbook_id)
        .bind(customer_id)
        .bind(ExecutionStatus::Running.as_str())
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            tracing::error!("Failed to record execution start {}: {}", execution_id, err);
        }

        execution_id
    }

    async fn append_outcome(&self, execution_id: Uuid, outcome: &ActionOutcome) {
        let outcome_json = match serde_json::to_value(outcome) {
            Ok(value) => serde_json::Value::Array(vec![value]),
            Err(err) => {
                tracing::error!("Failed to serialize action outcome: {}", err);
                return;
            }
        };

        let result = sqlx::query(
            r#"
            UPDATE playbook_executions
            SET actions_executed = actions_executed || $2
            WHERE id = $1
            "#,
        )
        .bind(execution_id)
        .bind(outcome_json)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            tracing::error!("Failed to append outcome to execution {}: {}", execution_id, err);
        }
    }

    async fn complete(&self, execution_id: Uuid, outcomes: &[ActionOutcome]) {
        let outcomes_json = match serde_json::to_value(outcomes) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!("Failed to serialize execution outcomes: {}", err);
                return;
            }
        };

        // The full outcome list is written again on completion so the
        // finished row is authoritative even if an append was lost.
        let result = sqlx::query(
            r#"
            UPDATE playbook_executions
            SET status = $3,
                actions_executed = $2,
                completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(execution_id)
        .bind(outcomes_json)
        .bind(ExecutionStatus::Completed.as_str())
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            tracing::error!("Failed to complete execution {}: {}", execution_id, err);
        }
    }
}

/// Map a stored status string back to its enum form.
pub fn status_from_str(status: &str) -> ExecutionStatus {
    match status {
        "completed" => ExecutionStatus::Completed,
        _ => ExecutionStatus::Running,
    }
}
