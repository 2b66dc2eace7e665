use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RoleConfig;
use crate::db::models::{Job, User};
use crate::db::UserStore;
use crate::matching::EligibilityPolicy;
use crate::notify::{
    Channel, DeliveryError, DeliveryStatus, NotificationEvent, NotificationKind,
    NotificationPayload, NotificationTransport, Recipient,
};

/// Sends job notifications to translators and customers.
///
/// Every send is best-effort: transport errors and timeouts come back as a
/// failed `DeliveryStatus`, never as an `Err`.
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationTransport>,
    users: Arc<dyn UserStore>,
    policy: Arc<dyn EligibilityPolicy>,
    roles: RoleConfig,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        transport: Arc<dyn NotificationTransport>,
        users: Arc<dyn UserStore>,
        policy: Arc<dyn EligibilityPolicy>,
        roles: RoleConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            users,
            policy,
            roles,
            timeout,
        }
    }

    /// Translators the eligibility policy accepts for `job`
    pub async fn eligible_translators(&self, job: &Job) -> Result<Vec<User>, DeliveryError> {
        let translators = self
            .users
            .users_of_type(self.roles.translator_role_id)
            .await
            .map_err(|e| DeliveryError::Lookup(e.to_string()))?;
        Ok(translators
            .into_iter()
            .filter(|translator| self.policy.is_eligible(translator, job))
            .collect())
    }

    async fn resolve(&self, job: &Job, recipient: Recipient) -> Result<Vec<User>, DeliveryError> {
        match recipient {
            Recipient::Broadcast => self.eligible_translators(job).await,
            Recipient::User(id) => {
                let user = self
                    .users
                    .find_user(id)
                    .await
                    .map_err(|e| DeliveryError::Lookup(e.to_string()))?;
                Ok(vec![user])
            }
        }
    }

    async fn bounded<F>(&self, send: F) -> Result<(), DeliveryError>
    where
        F: Future<Output = Result<(), DeliveryError>>,
    {
        match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::TimedOut(self.timeout.as_millis())),
        }
    }

    async fn push_to(&self, job: &Job, event: &NotificationEvent) -> Result<usize, DeliveryError> {
        let users = self.resolve(job, event.recipient).await?;
        if users.is_empty() {
            debug!("No push recipients for job {} ({})", job.id, event.recipient);
            return Ok(0);
        }
        self.bounded(self.transport.push(event, &users)).await?;
        Ok(users.len())
    }

    /// Push `payload` about `job` to `recipient`
    pub async fn send_push(
        &self,
        job: &Job,
        payload: NotificationPayload,
        recipient: Recipient,
    ) -> DeliveryStatus {
        let event = NotificationEvent {
            job_id: job.id,
            recipient,
            channel: Channel::Push,
            payload,
        };

        match self.push_to(job, &event).await {
            Ok(delivered) => DeliveryStatus::sent(Channel::Push, recipient, delivered),
            Err(e) => {
                warn!("Push for job {} to {} failed: {}", job.id, recipient, e);
                DeliveryStatus::failed(Channel::Push, recipient, &e)
            }
        }
    }

    /// Text `translator` about `job`
    pub async fn send_sms(&self, job: &Job, translator: &User) -> DeliveryStatus {
        let recipient = Recipient::User(translator.id);
        let event = NotificationEvent {
            job_id: job.id,
            recipient,
            channel: Channel::Sms,
            payload: NotificationPayload {
                kind: NotificationKind::JobOffered,
                job_id: job.id,
                message: format!(
                    "New {} booking #{} is available. Log in to accept it.",
                    job.language, job.id
                ),
            },
        };

        let result = match translator.phone.as_deref() {
            Some(phone) if !phone.trim().is_empty() => {
                self.bounded(self.transport.sms(&event, phone)).await
            }
            _ => Err(DeliveryError::NoPhone(translator.id)),
        };

        match result {
            Ok(()) => DeliveryStatus::sent(Channel::Sms, recipient, 1),
            Err(e) => {
                warn!("SMS for job {} to translator {} failed: {}", job.id, translator.id, e);
                DeliveryStatus::failed(Channel::Sms, recipient, &e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{JobStatus, NewJob};
    use crate::db::{JobStore, MemoryStore};
    use crate::matching::LanguageMatch;
    use crate::notify::LogTransport;
    use async_trait::async_trait;

    struct SlowTransport;

    #[async_trait]
    impl NotificationTransport for SlowTransport {
        async fn push(&self, _: &NotificationEvent, _: &[User]) -> Result<(), DeliveryError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        async fn sms(&self, _: &NotificationEvent, _: &str) -> Result<(), DeliveryError> {
            Err(DeliveryError::Failed("gateway rejected number".to_string()))
        }
    }

    async fn setup() -> (Arc<MemoryStore>, Job) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_user(User {
                id: 20,
                name: "Tolk".to_string(),
                phone: Some("+46700000000".to_string()),
                user_type: RoleConfig::default().translator_role_id,
                languages: vec!["sv".to_string()],
            })
            .await;
        let job = store
            .create(NewJob {
                customer_id: 1,
                language: "sv".to_string(),
                due_at: None,
                duration_minutes: None,
                customer_email: None,
                reference: None,
            })
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        (store, job)
    }

    fn dispatcher(
        store: Arc<MemoryStore>,
        transport: Arc<dyn NotificationTransport>,
    ) -> NotificationDispatcher {
        NotificationDispatcher::new(
            transport,
            store,
            Arc::new(LanguageMatch),
            RoleConfig::default(),
            Duration::from_millis(20),
        )
    }

    fn payload(job: &Job) -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::JobOffered,
            job_id: job.id,
            message: "offer".to_string(),
        }
    }

    #[actix_web::test]
    async fn broadcast_reaches_eligible_translators() {
        let (store, job) = setup().await;
        let dispatcher = dispatcher(store, Arc::new(LogTransport));

        let status = dispatcher.send_push(&job, payload(&job), Recipient::Broadcast).await;
        assert!(status.success);
        assert_eq!(status.delivered, 1);
        assert_eq!(status.recipient, "*");
    }

    #[actix_web::test]
    async fn push_timeout_degrades_to_status() {
        let (store, job) = setup().await;
        let dispatcher = dispatcher(store, Arc::new(SlowTransport));

        let status = dispatcher.send_push(&job, payload(&job), Recipient::Broadcast).await;
        assert!(!status.success);
        assert!(status.reason.unwrap().contains("timed out"));
    }

    #[actix_web::test]
    async fn sms_failure_degrades_to_status() {
        let (store, job) = setup().await;
        let translator = store.find_user(20).await.unwrap();
        let dispatcher = dispatcher(store, Arc::new(SlowTransport));

        let status = dispatcher.send_sms(&job, &translator).await;
        assert!(!status.success);
        assert_eq!(status.channel, Channel::Sms);
        assert!(status.reason.unwrap().contains("gateway rejected number"));
    }

    #[actix_web::test]
    async fn unknown_user_is_a_soft_failure() {
        let (store, job) = setup().await;
        let dispatcher = dispatcher(store, Arc::new(LogTransport));

        let status = dispatcher.send_push(&job, payload(&job), Recipient::User(404)).await;
        assert!(!status.success);
    }
}
