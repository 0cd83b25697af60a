//! Delivery of price drop alerts
//!
//! The monitor hands a [`PriceAlert`] and a recipient to a [`Notifier`] and
//! only looks at success or failure. Which transport is used is decided once
//! at start-up from [`NotifierConfig`].

pub mod email;
pub mod log;
pub mod webhook;

pub use email::{EmailConfig, EmailNotifier};
pub use log::LogNotifier;
pub use webhook::{WebhookConfig, WebhookNotifier};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::tracking::ResourceId;

/// A price that crossed below its target
#[derive(Debug, Clone, Serialize)]
pub struct PriceAlert {
    pub resource_id: ResourceId,
    pub locator: String,
    pub price: f64,
    pub threshold: f64,
    pub detected_at: DateTime<Utc>,
}

impl PriceAlert {
    pub fn subject(&self) -> &'static str {
        "Price Drop Alert! 📉"
    }

    /// Plain one-line summary
    pub fn summary(&self) -> String {
        format!(
            "Price for {} dropped to {:.2} (target {:.2})",
            self.locator, self.price, self.threshold
        )
    }

    /// HTML body for email delivery
    pub fn html_body(&self) -> String {
        format!(
            "<h1>Price Drop Alert!</h1>\n\
             <p>Good news! The price for the following product has dropped:</p>\n\
             <p><a href=\"{}\">Click here to view product</a></p>\n\
             <h2>New Price: ${:.2}</h2>\n\
             <p>Your target price: ${:.2}</p>",
            escape_html(&self.locator),
            self.price,
            self.threshold
        )
    }
}

/// Escape text for use in HTML content and quoted attributes
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Transport for alerts
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one alert to one recipient
    async fn send(&self, recipient: &str, alert: &PriceAlert) -> Result<(), NotifyError>;

    /// Transport name for logs
    fn name(&self) -> &str;
}

/// Which transport to build, with its settings
#[derive(Debug, Clone)]
pub enum NotifierConfig {
    Log,
    Webhook(WebhookConfig),
    Email(EmailConfig),
}

/// Build the configured notifier
pub fn build_notifier(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    let notifier: Arc<dyn Notifier> = match config {
        NotifierConfig::Log => Arc::new(LogNotifier),
        NotifierConfig::Webhook(webhook) => Arc::new(WebhookNotifier::new(webhook.clone())?),
        NotifierConfig::Email(email) => Arc::new(EmailNotifier::new(email.clone())?),
    };
    Ok(notifier)
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Email error: {0}")]
    Email(String),

    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    #[error("Notifier setup failed: {0}")]
    Setup(String),
}
