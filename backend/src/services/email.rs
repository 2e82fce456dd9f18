use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{authentication::Credentials, PoolConfig},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;
use tend_shared::Customer;

use crate::config::SmtpConfig;
use crate::error::AppError;

/// Outbound email service backed by a pooled SMTP transport.
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl EmailService {
    pub fn new(config: SmtpConfig) -> anyhow::Result<Self> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .pool_config(PoolConfig::new().max_size(10));

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<(), AppError> {
        let from: Mailbox =
            format!("{} <{}>", self.config.from_name, self.config.from_email).parse()?;

        let message = Message::builder()
            .from(from)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body_html.to_string())?;

        self.transport.send(message).await?;
        tracing::info!("Email sent to {}: {}", to, subject);

        Ok(())
    }
}

/// Render a named automation template for a customer.
///
/// Returns `(subject, html_body)`. Unrecognized template names fall back
/// to a generic notification so a typo in a playbook still produces mail.
pub fn render_automation_email(template: Option<&str>, customer: &Customer) -> (String, String) {
    match template {
        Some("welcome_email") => (
            format!("Welcome aboard, {}!", customer.account_name),
            format!(
                "<h2>Welcome to Tend, {name}!</h2>\
                 <p>Your account is now active. Your customer success team \
                 will reach out shortly to schedule a kickoff call.</p>",
                name = customer.account_name
            ),
        ),
        Some("renewal_reminder") => (
            format!("Your renewal is coming up, {}", customer.account_name),
            format!(
                "<h2>Renewal reminder</h2>\
                 <p>Hi {name}, your subscription renewal is approaching. \
                 Let's make sure everything is in order before the date.</p>",
                name = customer.account_name
            ),
        ),
        Some("check_in") => (
            format!("Checking in with {}", customer.account_name),
            format!(
                "<h2>How are things going?</h2>\
                 <p>Hi {name}, we wanted to check in and see how you're \
                 getting on. Reply to this email and we'll get right back \
                 to you.</p>",
                name = customer.account_name
            ),
        ),
        other => {
            if let Some(name) = other {
                tracing::warn!("Unknown email template '{}', using generic body", name);
            }
            (
                format!("An update from your success team, {}", customer.account_name),
                format!(
                    "<p>Hi {name}, your customer success team has an update \
                     for your account.</p>",
                    name = customer.account_name
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn customer() -> Customer {
        Customer {
            id: Uuid::new_v4(),
            account_name: "Globex".to_string(),
            industry: None,
            tier: None,
            status: "Active".to_string(),
            health_score: 80,
            renewal_date: None,
            account_owner_id: None,
            primary_contact_email: Some("team@globex.example".to_string()),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_welcome_template_renders_account_name() {
        let (subject, body) = render_automation_email(Some("welcome_email"), &customer());
        assert!(subject.contains("Globex"));
        assert!(body.contains("Globex"));
    }

    #[test]
    fn test_unknown_template_falls_back() {
        let (subject, _) = render_automation_email(Some("no_such_template"), &customer());
        assert!(subject.contains("Globex"));
    }
}
