//! Webhook delivery

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::{Notifier, NotifyError, PriceAlert};

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
}

/// Posts alerts as JSON to a fixed URL
pub struct WebhookNotifier {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Setup(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn payload(recipient: &str, alert: &PriceAlert) -> serde_json::Value {
        serde_json::json!({
            "recipient": recipient,
            "message": alert.summary(),
            "resource_id": alert.resource_id,
            "url": alert.locator,
            "price": alert.price,
            "target_price": alert.threshold,
            "timestamp": alert.detected_at.to_rfc3339(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, recipient: &str, alert: &PriceAlert) -> Result<(), NotifyError> {
        let mut request = self
            .client
            .post(&self.config.url)
            .json(&Self::payload(recipient, alert));

        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Webhook(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            return Err(NotifyError::Webhook(format!(
                "Webhook returned status {}",
                response.status()
            )));
        }

        tracing::debug!(
            resource_id = %alert.resource_id,
            url = %self.config.url,
            "Webhook notification sent"
        );

        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::ResourceId;

    #[test]
    fn test_payload_shape() {
        let alert = PriceAlert {
            resource_id: ResourceId(3),
            locator: "https://shop.example/item".to_string(),
            price: 9.5,
            threshold: 10.0,
            detected_at: chrono::Utc::now(),
        };

        let payload = WebhookNotifier::payload("ops@example.com", &alert);
        assert_eq!(payload["recipient"], "ops@example.com");
        assert_eq!(payload["resource_id"], 3);
        assert_eq!(payload["url"], "https://shop.example/item");
        assert_eq!(payload["price"], 9.5);
        assert_eq!(payload["target_price"], 10.0);
    }

    #[tokio::test]
    async fn test_unreachable_webhook_fails() {
        let notifier = WebhookNotifier::new(WebhookConfig {
            url: "http://127.0.0.1:9/hook".to_string(),
            headers: HashMap::new(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let alert = PriceAlert {
            resource_id: ResourceId(1),
            locator: "https://shop.example/item".to_string(),
            price: 1.0,
            threshold: 2.0,
            detected_at: chrono::Utc::now(),
        };

        let result = notifier.send("ops@example.com", &alert).await;
        assert!(matches!(result, Err(NotifyError::Webhook(_))));
    }
}
