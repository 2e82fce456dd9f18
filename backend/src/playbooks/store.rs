use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::AppError;
use crate::playbooks::model::{Action, NewPlaybook, Playbook, Trigger};

/// Persistence seam for playbook rules.
#[async_trait]
pub trait PlaybookStore: Send + Sync {
    /// All enabled playbooks, highest priority first.
    async fn list_enabled(&self) -> Result<Vec<Playbook>, AppError>;

    /// Bump the trigger bookkeeping after a playbook has run.
    async fn record_trigger(&self, playbook_id: Uuid) -> Result<(), AppError>;

    /// Insert a playbook unless one with the same name already exists.
    /// Returns true if a row was inserted.
    async fn insert_if_absent(&self, playbook: &NewPlaybook) -> Result<bool, AppError>;
}

pub struct PgPlaybookStore {
    pool: PgPool,
}

impl PgPlaybookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaybookStore for PgPlaybookStore {
    async fn list_enabled(&self) -> Result<Vec<Playbook>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, trigger, actions, enabled, priority,
                   last_triggered_at, execution_count, created_at
            FROM playbooks
            WHERE enabled = TRUE
            ORDER BY priority DESC, created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut playbooks = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.try_get("id")?;
            let name: String = row.try_get("name")?;
            let trigger_json: serde_json::Value = row.try_get("trigger")?;
            let actions_json: serde_json::Value = row.try_get("actions")?;

            // A row that fails to parse is skipped, not fatal: one bad
            // playbook must not stall every other automation.
            let trigger: Trigger = match serde_json::from_value(trigger_json) {
                Ok(trigger) => trigger,
                Err(err) => {
                    tracing::warn!("Skipping playbook '{}' ({}): bad trigger: {}", name, id, err);
                    continue;
                }
            };
            let actions: Vec<Action> = match serde_json::from_value(actions_json) {
                Ok(actions) => actions,
                Err(err) => {
                    tracing::warn!("Skipping playbook '{}' ({}): bad actions: {}", name, id, err);
                    continue;
                }
            };

            playbooks.push(Playbook {
                id,
                name,
                description: row.try_get("description")?,
                trigger,
                actions,
                enabled: row.try_get("enabled")?,
                priority: row.try_get("priority")?,
                last_triggered_at: row.try_get::<Option<DateTime<Utc>>, _>("last_triggered_at")?,
                execution_count: row.try_get("execution_count")?,
                created_at: row.try_get("created_at")?,
            });
        }

        Ok(playbooks)
    }

    async fn record_trigger(&self, playbook_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE playbooks
            SET last_triggered_at = NOW(),
                execution_count = execution_count + 1,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(playbook_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_if_absent(&self, playbook: &NewPlaybook) -> Result<bool, AppError> {
        let trigger = serde_json::to_value(&playbook.trigger)?;
        let actions = serde_json::to_value(&playbook.actions)?;

        let result = sqlx::query(
            r#"
            INSERT INTO playbooks (name, description, trigger, actions, enabled, priority)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&playbook.name)
        .bind(&playbook.description)
        .bind(trigger)
        .bind(actions)
        .bind(playbook.enabled)
        .bind(playbook.priority)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
