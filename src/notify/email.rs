//! SMTP email delivery

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Notifier, NotifyError, PriceAlert};

#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    /// Sender address; defaults to the username when empty
    pub from: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .finish()
    }
}

/// Sends HTML alert emails over SMTP with STARTTLS
pub struct EmailNotifier {
    from: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Result<Self, NotifyError> {
        let sender = if config.from.is_empty() {
            &config.username
        } else {
            &config.from
        };
        let from = parse_mailbox(sender)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifyError::Setup(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(config.username, config.password))
            .timeout(Some(config.timeout))
            .build();

        Ok(Self { from, mailer })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse()
        .map_err(|_| NotifyError::InvalidAddress(address.to_string()))
}

fn build_message(from: &Mailbox, recipient: &str, alert: &PriceAlert) -> Result<Message, NotifyError> {
    Message::builder()
        .from(from.clone())
        .to(parse_mailbox(recipient)?)
        .subject(alert.subject())
        .header(ContentType::TEXT_HTML)
        .body(alert.html_body())
        .map_err(|e| NotifyError::Email(e.to_string()))
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, recipient: &str, alert: &PriceAlert) -> Result<(), NotifyError> {
        let message = build_message(&self.from, recipient, alert)?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::Email(e.to_string()))?;

        tracing::debug!(
            resource_id = %alert.resource_id,
            recipient = %recipient,
            "Email notification sent"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "email"
    }
}
