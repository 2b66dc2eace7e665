use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::db::models::{
    DistanceRecord, Job, JobFilter, JobPatch, JobStatus, NewJob, StatusChange, User,
};
use crate::db::store::{DistanceStore, JobStore, StoreError, UserStore};

#[derive(Default)]
struct Tables {
    jobs: BTreeMap<i64, Job>,
    distances: HashMap<i64, DistanceRecord>,
    users: BTreeMap<i64, User>,
    next_job_id: i64,
}

/// Process-local store used when no database is configured.
///
/// A single async mutex guards all tables, so every read-check-write
/// (including status transitions) is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON array of users, e.g. for local runs without a database
    pub async fn load_users(&self, path: &str) -> Result<usize, StoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Corrupt(format!("cannot read {}: {}", path, e)))?;
        let users: Vec<User> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Corrupt(format!("cannot parse {}: {}", path, e)))?;
        let count = users.len();
        for user in users {
            self.insert_user(user).await;
        }
        Ok(count)
    }

    /// Adds or replaces a user in the directory
    pub async fn insert_user(&self, user: User) {
        let mut tables = self.tables.lock().await;
        debug!("Registering user id={} type={}", user.id, user.user_type);
        tables.users.insert(user.id, user);
    }
}

fn newest_first(mut jobs: Vec<Job>) -> Vec<Job> {
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    jobs
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create(&self, new_job: NewJob) -> Result<Job, StoreError> {
        let mut tables = self.tables.lock().await;
        tables.next_job_id += 1;
        let now = Utc::now();
        let job = Job {
            id: tables.next_job_id,
            status: JobStatus::Pending,
            customer_id: new_job.customer_id,
            translator_id: None,
            language: new_job.language,
            due_at: new_job.due_at,
            duration_minutes: new_job.duration_minutes,
            session_time: None,
            flagged: false,
            admin_comment: None,
            customer_email: new_job.customer_email,
            reference: new_job.reference,
            no_show: false,
            manually_handled: false,
            by_admin: false,
            created_at: now,
            updated_at: now,
        };
        tables.jobs.insert(job.id, job.clone());
        debug!("Job created with id={}", job.id);
        Ok(job)
    }

    async fn find(&self, id: i64) -> Result<Job, StoreError> {
        let tables = self.tables.lock().await;
        tables.jobs.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn update(&self, id: i64, patch: JobPatch) -> Result<Job, StoreError> {
        let mut tables = self.tables.lock().await;
        let current = tables.jobs.get(&id).ok_or(StoreError::NotFound(id))?;

        let mut merged = patch.apply_to(current);
        merged.check_invariants().map_err(StoreError::Validation)?;
        merged.updated_at = Utc::now();

        tables.jobs.insert(id, merged.clone());
        Ok(merged)
    }

    async fn transition(
        &self,
        id: i64,
        expected: &[JobStatus],
        change: StatusChange,
    ) -> Result<Job, StoreError> {
        let mut tables = self.tables.lock().await;
        let current = tables.jobs.get(&id).ok_or(StoreError::NotFound(id))?;

        if !expected.contains(&current.status) {
            return Err(StoreError::Conflict {
                id,
                current: current.status,
            });
        }

        let next = change.apply_to(current, Utc::now());
        next.check_invariants().map_err(StoreError::Validation)?;

        debug!("Job {} moved {} -> {}", id, current.status, next.status);
        tables.jobs.insert(id, next.clone());
        Ok(next)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Job>, StoreError> {
        let tables = self.tables.lock().await;
        let jobs = tables
            .jobs
            .values()
            .filter(|job| job.involves(user_id))
            .cloned()
            .collect();
        Ok(newest_first(jobs))
    }

    async fn list_all(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
        let tables = self.tables.lock().await;
        let jobs = tables
            .jobs
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();
        Ok(newest_first(jobs))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl DistanceStore for MemoryStore {
    async fn upsert(
        &self,
        job_id: i64,
        distance: Option<f64>,
        time: Option<f64>,
    ) -> Result<Option<DistanceRecord>, StoreError> {
        if distance.is_none() && time.is_none() {
            debug!("Distance feed for job {} carried no values, skipping", job_id);
            return Ok(None);
        }

        let mut tables = self.tables.lock().await;
        let record = tables
            .distances
            .entry(job_id)
            .or_insert_with(|| DistanceRecord {
                job_id,
                distance: None,
                time: None,
            });
        if distance.is_some() {
            record.distance = distance;
        }
        if time.is_some() {
            record.time = time;
        }
        Ok(Some(record.clone()))
    }

    async fn find_distance(&self, job_id: i64) -> Result<Option<DistanceRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.distances.get(&job_id).cloned())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: i64) -> Result<User, StoreError> {
        let tables = self.tables.lock().await;
        tables.users.get(&id).cloned().ok_or(StoreError::UserNotFound(id))
    }

    async fn users_of_type(&self, user_type: i32) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .filter(|user| user.user_type == user_type)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::TranslatorChange;

    fn new_job(customer_id: i64) -> NewJob {
        NewJob {
            customer_id,
            language: "de".to_string(),
            due_at: None,
            duration_minutes: Some(30),
            customer_email: None,
            reference: None,
        }
    }

    #[actix_web::test]
    async fn transition_is_compare_and_swap() {
        let store = MemoryStore::new();
        let job = store.create(new_job(1)).await.unwrap();

        let offered = store
            .transition(job.id, &[JobStatus::Pending], StatusChange::to(JobStatus::Offered))
            .await
            .unwrap();
        assert_eq!(offered.status, JobStatus::Offered);

        let err = store
            .transition(job.id, &[JobStatus::Pending], StatusChange::to(JobStatus::Offered))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict { current: JobStatus::Offered, .. }
        ));
    }

    #[actix_web::test]
    async fn transition_assigns_and_clears_translator() {
        let store = MemoryStore::new();
        let job = store.create(new_job(1)).await.unwrap();

        let accepted = store
            .transition(
                job.id,
                &[JobStatus::Pending],
                StatusChange::to(JobStatus::Accepted).assign(42),
            )
            .await
            .unwrap();
        assert_eq!(accepted.translator_id, Some(42));

        let change = StatusChange::to(JobStatus::Pending).clear_translator();
        assert_eq!(change.translator, TranslatorChange::Clear);
        let reopened = store
            .transition(job.id, &[JobStatus::Accepted], change)
            .await
            .unwrap();
        assert_eq!(reopened.translator_id, None);
    }

    #[actix_web::test]
    async fn rejected_update_writes_nothing() {
        let store = MemoryStore::new();
        let job = store.create(new_job(1)).await.unwrap();

        let patch = JobPatch {
            session_time: Some("02:00".to_string()),
            flagged: Some(true),
            ..Default::default()
        };
        let err = store.update(job.id, patch).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let stored = store.find(job.id).await.unwrap();
        assert_eq!(stored.session_time, None);
        assert!(!stored.flagged);
    }

    #[actix_web::test]
    async fn distance_upsert_keeps_absent_fields() {
        let store = MemoryStore::new();

        assert_eq!(store.upsert(5, None, None).await.unwrap(), None);
        assert_eq!(store.find_distance(5).await.unwrap(), None);

        store.upsert(5, Some(12.5), None).await.unwrap();
        let record = store.upsert(5, None, Some(40.0)).await.unwrap().unwrap();
        assert_eq!(record.distance, Some(12.5));
        assert_eq!(record.time, Some(40.0));

        store.upsert(5, None, None).await.unwrap();
        assert_eq!(store.find_distance(5).await.unwrap(), Some(record));
    }

    #[actix_web::test]
    async fn users_load_from_json_file() {
        let path = std::env::temp_dir().join(format!("booking-users-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"id": 3, "name": "Ana", "phone": null, "user_type": 2, "languages": ["sv"]}]"#,
        )
        .unwrap();

        let store = MemoryStore::new();
        let loaded = store.load_users(path.to_str().unwrap()).await.unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(store.users_of_type(2).await.unwrap()[0].name, "Ana");

        let _ = std::fs::remove_file(&path);
    }

    #[actix_web::test]
    async fn list_by_user_covers_customer_and_translator() {
        let store = MemoryStore::new();
        let first = store.create(new_job(1)).await.unwrap();
        store.create(new_job(2)).await.unwrap();
        store
            .transition(
                first.id,
                &[JobStatus::Pending],
                StatusChange::to(JobStatus::Accepted).assign(9),
            )
            .await
            .unwrap();

        assert_eq!(store.list_by_user(1).await.unwrap().len(), 1);
        assert_eq!(store.list_by_user(9).await.unwrap().len(), 1);
        assert_eq!(store.list_by_user(3).await.unwrap().len(), 0);
    }
}
