use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tend_shared::{ActivityLog, Contact, Customer, Task};
use uuid::Uuid;

use crate::error::{ApiResult, AppError};
use crate::websocket::WsMessage;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub account_name: String,
    pub industry: Option<String>,
    pub tier: Option<String>,
    pub status: Option<String>,
    pub health_score: Option<i32>,
    pub renewal_date: Option<NaiveDate>,
    pub account_owner_id: Option<Uuid>,
    pub primary_contact_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    pub account_name: Option<String>,
    pub industry: Option<String>,
    pub tier: Option<String>,
    pub status: Option<String>,
    pub health_score: Option<i32>,
    pub renewal_date: Option<NaiveDate>,
    pub account_owner_id: Option<Uuid>,
    pub primary_contact_email: Option<String>,
}

pub async fn list_customers(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Customer>>> {
    let customers = sqlx::query_as::<_, Customer>(
        "SELECT * FROM customers ORDER BY account_name ASC",
    )
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(customers))
}

pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Customer>> {
    let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))?;

    Ok(Json(customer))
}

pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCustomerRequest>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        INSERT INTO customers
            (account_name, industry, tier, status, health_score, renewal_date,
             account_owner_id, primary_contact_email)
        VALUES ($1, $2, $3, COALESCE($4, 'Active'), COALESCE($5, 100), $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(&request.account_name)
    .bind(&request.industry)
    .bind(&request.tier)
    .bind(&request.status)
    .bind(request.health_score)
    .bind(request.renewal_date)
    .bind(request.account_owner_id)
    .bind(&request.primary_contact_email)
    .fetch_one(&state.db_pool)
    .await?;

    Ok((StatusCode::CREATED, Json(customer)))
}

/// Update a customer, then evaluate playbook triggers against the new
/// state. Automation is best-effort: the update succeeds even when the
/// trigger check is aborted internally.
pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCustomerRequest>,
) -> ApiResult<Json<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        UPDATE customers SET
            account_name = COALESCE($2, account_name),
            industry = COALESCE($3, industry),
            tier = COALESCE($4, tier),
            status = COALESCE($5, status),
            health_score = COALESCE($6, health_score),
            renewal_date = COALESCE($7, renewal_date),
            account_owner_id = COALESCE($8, account_owner_id),
            primary_contact_email = COALESCE($9, primary_contact_email),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&request.account_name)
    .bind(&request.industry)
    .bind(&request.tier)
    .bind(&request.status)
    .bind(request.health_score)
    .bind(request.renewal_date)
    .bind(request.account_owner_id)
    .bind(&request.primary_contact_email)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Customer".to_string()))?;

    if let Ok(payload) = serde_json::to_value(&customer) {
        state
            .ws_manager
            .broadcast_all(WsMessage::new("customer:updated", payload));
    }

    let results = state.playbooks.check_triggers(&customer).await;
    if !results.is_empty() {
        tracing::info!(
            "{} playbook(s) executed for customer '{}'",
            results.len(),
            customer.account_name
        );
    }

    Ok(Json(customer))
}

pub async fn list_customer_contacts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Contact>>> {
    let contacts = sqlx::query_as::<_, Contact>(
        "SELECT * FROM contacts WHERE customer_id = $1 ORDER BY is_primary DESC, name ASC",
    )
    .bind(id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(contacts))
}

pub async fn list_customer_tasks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Task>>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE customer_id = $1 ORDER BY created_at DESC",
    )
    .bind(id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(tasks))
}

/// Activity feed for a customer, newest first. Automated emails show up
/// here alongside manually logged activity.
pub async fn list_customer_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ActivityLog>>> {
    let activity = sqlx::query_as::<_, ActivityLog>(
        "SELECT * FROM activity_logs WHERE customer_id = $1 ORDER BY created_at DESC LIMIT 100",
    )
    .bind(id)
    .fetch_all(&state.db_pool)
    .await?;

    Ok(Json(activity))
}
