use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiResult, AppError};
use crate::playbooks::model::{ActionOutcome, ExecutionStatus, NewPlaybook};
use crate::playbooks::recorder::status_from_str;
use crate::AppState;

/// Playbook as exposed by the admin API. Trigger and actions stay raw
/// JSON here so rows with unrecognized kinds are still visible.
#[derive(Debug, Serialize)]
pub struct PlaybookResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub trigger: serde_json::Value,
    pub actions: serde_json::Value,
    pub enabled: bool,
    pub priority: i32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub execution_count: i64,
    pub created_at: DateTime<Utc>,
}

fn playbook_from_row(row: &sqlx::postgres::PgRow) -> Result<PlaybookResponse, sqlx::Error> {
    Ok(PlaybookResponse {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        trigger: row.try_get("trigger")?,
        actions: row.try_get("actions")?,
        enabled: row.try_get("enabled")?,
        priority: row.try_get("priority")?,
        last_triggered_at: row.try_get("last_triggered_at")?,
        execution_count: row.try_get("execution_count")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn list_playbooks(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<PlaybookResponse>>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, description, trigger, actions, enabled, priority,
               last_triggered_at, execution_count, created_at
        FROM playbooks
        ORDER BY priority DESC, created_at ASC
        "#,
    )
    .fetch_all(&state.db_pool)
    .await?;

    let playbooks = rows
        .iter()
        .map(playbook_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(playbooks))
}

pub async fn create_playbook(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewPlaybook>,
) -> ApiResult<(StatusCode, Json<PlaybookResponse>)> {
    let trigger = serde_json::to_value(&request.trigger)?;
    let actions = serde_json::to_value(&request.actions)?;

    let row = sqlx::query(
        r#"
        INSERT INTO playbooks (name, description, trigger, actions, enabled, priority)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (name) DO NOTHING
        RETURNING id, name, description, trigger, actions, enabled, priority,
                  last_triggered_at, execution_count, created_at
        "#,
    )
    .bind(&request.name)
    .bind(&request.description)
    .bind(trigger)
    .bind(actions)
    .bind(request.enabled)
    .bind(request.priority)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or_else(|| {
        AppError::Conflict(format!("A playbook named '{}' already exists", request.name))
    })?;

    Ok((StatusCode::CREATED, Json(playbook_from_row(&row)?)))
}

#[derive(Debug, Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

/// Playbooks are disabled rather than deleted.
pub async fn set_playbook_enabled(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetEnabledRequest>,
) -> ApiResult<Json<PlaybookResponse>> {
    let row = sqlx::query(
        r#"
        UPDATE playbooks
        SET enabled = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING id, name, description, trigger, actions, enabled, priority,
                  last_triggered_at, execution_count, created_at
        "#,
    )
    .bind(id)
    .bind(request.enabled)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Playbook".to_string()))?;

    Ok(Json(playbook_from_row(&row)?))
}

#[derive(Debug, Serialize)]
pub struct ExecutionResponse {
    pub id: Uuid,
    pub playbook_id: Uuid,
    pub customer_id: Uuid,
    pub status: ExecutionStatus,
    pub actions_executed: Vec<ActionOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

pub async fn list_playbook_executions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ExecutionResponse>>> {
    let rows = sqlx::query(
        r#"
        SELECT id, playbook_id, customer_id, status, actions_executed,
               started_at, completed_at
        FROM playbook_executions
        WHERE playbook_id = $1
        ORDER BY started_at DESC
        LIMIT 100
        "#,
    )
    .bind(id)
    .fetch_all(&state.db_pool)
    .await?;

    let mut executions = Vec::with_capacity(rows.len());
    for row in rows {
        let status: String = row.try_get("status")?;
        let outcomes_json: serde_json::Value = row.try_get("actions_executed")?;
        let actions_executed: Vec<ActionOutcome> =
            serde_json::from_value(outcomes_json).unwrap_or_default();

        executions.push(ExecutionResponse {
            id: row.try_get("id")?,
            playbook_id: row.try_get("playbook_id")?,
            customer_id: row.try_get("customer_id")?,
            status: status_from_str(&status),
            actions_executed,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        });
    }

    Ok(Json(executions))
}
