use async_trait::async_trait;

use consult_ports::error::NotifyError;
use consult_ports::outbound::Notifier;
use consult_ports::types::Notification;

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            recipient = %notification.recipient,
            kind = notification.kind.as_str(),
            consult_id = %notification.consult_id,
            unit = %notification.unit,
            urgency = %notification.urgency,
            level = notification.escalation_level,
            "notification"
        );
        Ok(())
    }
}
