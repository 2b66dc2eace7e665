#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use booking_dispatch::api::booking::models::CreateJobRequest;
use booking_dispatch::api::booking::BookingService;
use booking_dispatch::api::caller::Caller;
use booking_dispatch::config::RoleConfig;
use booking_dispatch::db::models::{Job, User};
use booking_dispatch::db::MemoryStore;
use booking_dispatch::matching::LanguageMatch;
use booking_dispatch::notify::{DeliveryError, NotificationEvent, NotificationTransport};

pub const CUSTOMER: i64 = 1;
pub const OTHER_CUSTOMER: i64 = 2;
pub const ADMIN: i64 = 100;
pub const TRANSLATOR_A: i64 = 10;
pub const TRANSLATOR_B: i64 = 11;
pub const TRANSLATOR_FI: i64 = 12;

/// Transport that records every push and SMS it is asked to deliver
#[derive(Default)]
pub struct RecordingTransport {
    pub pushes: Mutex<Vec<(NotificationEvent, Vec<i64>)>>,
    pub texts: Mutex<Vec<(NotificationEvent, String)>>,
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn push(
        &self,
        event: &NotificationEvent,
        recipients: &[User],
    ) -> Result<(), DeliveryError> {
        let ids = recipients.iter().map(|user| user.id).collect();
        self.pushes.lock().unwrap().push((event.clone(), ids));
        Ok(())
    }

    async fn sms(&self, event: &NotificationEvent, phone: &str) -> Result<(), DeliveryError> {
        self.texts.lock().unwrap().push((event.clone(), phone.to_string()));
        Ok(())
    }
}

/// Transport whose provider is always down
pub struct FailingTransport;

#[async_trait]
impl NotificationTransport for FailingTransport {
    async fn push(&self, _: &NotificationEvent, _: &[User]) -> Result<(), DeliveryError> {
        Err(DeliveryError::Failed("push provider unavailable".to_string()))
    }

    async fn sms(&self, _: &NotificationEvent, _: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::Failed("SMS gateway returned 503".to_string()))
    }
}

pub fn roles() -> RoleConfig {
    RoleConfig::default()
}

pub fn customer(id: i64) -> Caller {
    Caller::new(id, roles().customer_role_id, &roles())
}

pub fn translator(id: i64) -> Caller {
    Caller::new(id, roles().translator_role_id, &roles())
}

pub fn admin() -> Caller {
    Caller::new(ADMIN, roles().admin_role_id, &roles())
}

fn user(id: i64, user_type: i32, languages: &[&str]) -> User {
    User {
        id,
        name: format!("user-{}", id),
        phone: Some(format!("+4670000{:04}", id)),
        user_type,
        languages: languages.iter().map(|l| l.to_string()).collect(),
    }
}

pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let roles = roles();
    store.insert_user(user(CUSTOMER, roles.customer_role_id, &[])).await;
    store.insert_user(user(OTHER_CUSTOMER, roles.customer_role_id, &[])).await;
    store.insert_user(user(ADMIN, roles.admin_role_id, &[])).await;
    store.insert_user(user(TRANSLATOR_A, roles.translator_role_id, &["sv", "en"])).await;
    store.insert_user(user(TRANSLATOR_B, roles.translator_role_id, &["sv"])).await;
    store.insert_user(user(TRANSLATOR_FI, roles.translator_role_id, &["fi"])).await;
    store
}

pub fn service_with(
    store: Arc<MemoryStore>,
    transport: Arc<dyn NotificationTransport>,
) -> BookingService {
    BookingService::new(
        store,
        transport,
        Arc::new(LanguageMatch),
        roles(),
        Duration::from_millis(200),
    )
}

pub async fn service() -> (BookingService, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let service = service_with(seeded_store().await, transport.clone());
    (service, transport)
}

pub fn booking(language: &str) -> CreateJobRequest {
    CreateJobRequest {
        customer_id: None,
        language: language.to_string(),
        due_at: None,
        duration_minutes: Some(45),
        customer_email: None,
        reference: None,
    }
}

/// Creates a Swedish job for `CUSTOMER` and offers it
pub async fn offered_job(service: &BookingService) -> Job {
    let created = service.create_job(&customer(CUSTOMER), booking("sv")).await.unwrap();
    service
        .offer_job(&customer(CUSTOMER), created.job.id)
        .await
        .unwrap()
        .job
}

/// An offered job accepted by `TRANSLATOR_A`
pub async fn accepted_job(service: &BookingService) -> Job {
    let job = offered_job(service).await;
    service
        .accept_job(&translator(TRANSLATOR_A), job.id)
        .await
        .unwrap()
        .job
}
