use async_trait::async_trait;

use super::{Notifier, NotifyError, PriceAlert};

/// Writes alerts to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, alert: &PriceAlert) -> Result<(), NotifyError> {
        tracing::warn!(
            resource_id = %alert.resource_id,
            recipient = %recipient,
            "Alert triggered: {}",
            alert.summary()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
