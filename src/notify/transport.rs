use async_trait::async_trait;
use tracing::info;

use crate::db::models::User;
use crate::notify::{DeliveryError, NotificationEvent};

/// Outbound push/SMS channel
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn push(
        &self,
        event: &NotificationEvent,
        recipients: &[User],
    ) -> Result<(), DeliveryError>;

    async fn sms(&self, event: &NotificationEvent, phone: &str) -> Result<(), DeliveryError>;
}

/// Transport that records deliveries in the log instead of calling a provider
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn push(
        &self,
        event: &NotificationEvent,
        recipients: &[User],
    ) -> Result<(), DeliveryError> {
        let ids: Vec<i64> = recipients.iter().map(|user| user.id).collect();
        info!(
            "Push {:?} for job {} to {:?}: {}",
            event.payload.kind, event.job_id, ids, event.payload.message
        );
        Ok(())
    }

    async fn sms(&self, event: &NotificationEvent, phone: &str) -> Result<(), DeliveryError> {
        info!(
            "SMS {:?} for job {} to {}: {}",
            event.payload.kind, event.job_id, phone, event.payload.message
        );
        Ok(())
    }
}
