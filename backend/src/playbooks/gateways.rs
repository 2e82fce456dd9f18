use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tend_shared::Customer;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::services::EmailService;
use crate::websocket::{WsManager, WsMessage};

/// Task to be created by an automation.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub customer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_by: String,
}

/// Activity log entry written by an automation.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub customer_id: Uuid,
    pub activity_type: String,
    pub title: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[async_trait]
pub trait TaskGateway: Send + Sync {
    async fn create_task(&self, task: NewTask) -> Result<Uuid, AppError>;
}

#[async_trait]
pub trait ActivityGateway: Send + Sync {
    async fn log_activity(&self, activity: NewActivity) -> Result<Uuid, AppError>;
}

#[async_trait]
pub trait CustomerGateway: Send + Sync {
    async fn update_status(&self, customer_id: Uuid, status: &str) -> Result<(), AppError>;
    async fn update_owner(&self, customer_id: Uuid, owner_id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body_html: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_message(&self, channel: Option<&str>, text: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait WebhookGateway: Send + Sync {
    async fn post_webhook(
        &self,
        url_override: Option<&str>,
        event: &str,
        data: &serde_json::Value,
    ) -> Result<(), AppError>;
}

/// Push events to connected clients. Broadcasting is fire-and-forget.
pub trait Broadcaster: Send + Sync {
    fn broadcast_customer_update(&self, customer: &Customer);
    fn broadcast_activity(&self, activity: &serde_json::Value);
}

/// Everything the executor touches in the outside world, behind trait
/// objects so tests can substitute fakes.
#[derive(Clone)]
pub struct Gateways {
    pub tasks: Arc<dyn TaskGateway>,
    pub activities: Arc<dyn ActivityGateway>,
    pub customers: Arc<dyn CustomerGateway>,
    pub email: Arc<dyn EmailGateway>,
    pub chat: Arc<dyn ChatGateway>,
    pub webhooks: Arc<dyn WebhookGateway>,
    pub broadcaster: Arc<dyn Broadcaster>,
}

impl Gateways {
    pub fn production(
        pool: PgPool,
        email_service: Arc<EmailService>,
        ws_manager: Arc<WsManager>,
        config: &Config,
    ) -> Self {
        let client = reqwest::Client::new();
        Self {
            tasks: Arc::new(PgTaskGateway { pool: pool.clone() }),
            activities: Arc::new(PgActivityGateway { pool: pool.clone() }),
            customers: Arc::new(PgCustomerGateway { pool }),
            email: Arc::new(SmtpEmailGateway {
                service: email_service,
            }),
            chat: Arc::new(SlackWebhookGateway {
                client: client.clone(),
                webhook_url: config.slack_webhook_url.clone(),
            }),
            webhooks: Arc::new(HttpWebhookGateway {
                client,
                default_url: config.automation_webhook_url.clone(),
            }),
            broadcaster: Arc::new(WsBroadcaster { ws: ws_manager }),
        }
    }
}

pub struct PgTaskGateway {
    pool: PgPool,
}

#[async_trait]
impl TaskGateway for PgTaskGateway {
    async fn create_task(&self, task: NewTask) -> Result<Uuid, AppError> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO tasks (customer_id, title, description, priority, assigned_to, due_date, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(task.customer_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.priority)
        .bind(task.assigned_to)
        .bind(task.due_date)
        .bind(&task.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }
}

pub struct PgActivityGateway {
    pool: PgPool,
}

#[async_trait]
impl ActivityGateway for PgActivityGateway {
    async fn log_activity(&self, activity: NewActivity) -> Result<Uuid, AppError> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO activity_logs (customer_id, activity_type, title, description, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(activity.customer_id)
        .bind(&activity.activity_type)
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(&activity.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }
}

pub struct PgCustomerGateway {
    pool: PgPool,
}

#[async_trait]
impl CustomerGateway for PgCustomerGateway {
    async fn update_status(&self, customer_id: Uuid, status: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE customers SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(customer_id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_owner(&self, customer_id: Uuid, owner_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE customers SET account_owner_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(customer_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct SmtpEmailGateway {
    service: Arc<EmailService>,
}

#[async_trait]
impl EmailGateway for SmtpEmailGateway {
    async fn send_email(&self, to: &str, subject: &str, body_html: &str) -> Result<(), AppError> {
        if !self.service.is_configured() {
            // Mail is optional in dev environments.
            tracing::info!("SMTP not configured, skipping email to {}: {}", to, subject);
            return Ok(());
        }
        self.service.send(to, subject, body_html).await
    }
}

/// Posts to a Slack incoming webhook. Log-only when no URL is configured.
pub struct SlackWebhookGateway {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

#[async_trait]
impl ChatGateway for SlackWebhookGateway {
    async fn send_message(&self, channel: Option<&str>, text: &str) -> Result<(), AppError> {
        let Some(url) = &self.webhook_url else {
            tracing::info!(
                "Slack webhook not configured, would post to {}: {}",
                channel.unwrap_or("#general"),
                text
            );
            return Ok(());
        };

        let mut payload = serde_json::json!({ "text": text });
        if let Some(channel) = channel {
            payload["channel"] = serde_json::Value::String(channel.to_string());
        }

        self.client
            .post(url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

/// Generic outbound webhook for automation events.
pub struct HttpWebhookGateway {
    client: reqwest::Client,
    default_url: Option<String>,
}

#[async_trait]
impl WebhookGateway for HttpWebhookGateway {
    async fn post_webhook(
        &self,
        url_override: Option<&str>,
        event: &str,
        data: &serde_json::Value,
    ) -> Result<(), AppError> {
        let url = match url_override {
            Some(url) => url,
            None => match &self.default_url {
                Some(url) => url.as_str(),
                None => {
                    tracing::info!("No webhook URL configured, skipping event '{}'", event);
                    return Ok(());
                }
            },
        };

        let payload = serde_json::json!({
            "event": event,
            "data": data,
            "timestamp": Utc::now(),
        });

        self.client
            .post(url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        tracing::info!("Webhook '{}' delivered to {}", event, url);
        Ok(())
    }
}

pub struct WsBroadcaster {
    ws: Arc<WsManager>,
}

impl Broadcaster for WsBroadcaster {
    fn broadcast_customer_update(&self, customer: &Customer) {
        if let Ok(payload) = serde_json::to_value(customer) {
            self.ws
                .broadcast_all(WsMessage::new("customer:updated", payload));
        }
    }

    fn broadcast_activity(&self, activity: &serde_json::Value) {
        self.ws
            .broadcast_all(WsMessage::new("activity:new", activity.clone()));
    }
}
