use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::{
    DistanceRecord, Job, JobFilter, JobPatch, JobStatus, NewJob, StatusChange, User,
};

/// Errors raised by the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(i64),

    #[error("user not found: {0}")]
    UserNotFound(i64),

    /// The conditional transition lost against the job's current status
    #[error("job {id} is {current}")]
    Conflict { id: i64, current: JobStatus },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Job persistence contract shared by the PostgreSQL and in-memory stores
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: NewJob) -> Result<Job, StoreError>;

    async fn find(&self, id: i64) -> Result<Job, StoreError>;

    /// Partial update. The merged record is validated before anything is written.
    async fn update(&self, id: i64, patch: JobPatch) -> Result<Job, StoreError>;

    /// Compare-and-swap on the current status. Fails with `Conflict` when the
    /// stored status is not one of `expected`.
    async fn transition(
        &self,
        id: i64,
        expected: &[JobStatus],
        change: StatusChange,
    ) -> Result<Job, StoreError>;

    /// Jobs where the user is the customer or the assigned translator, newest first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Job>, StoreError>;

    async fn list_all(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Distance/time metadata keyed by job
#[async_trait]
pub trait DistanceStore: Send + Sync {
    /// Writes only the supplied fields. Both `None` is a no-op and returns `None`.
    async fn upsert(
        &self,
        job_id: i64,
        distance: Option<f64>,
        time: Option<f64>,
    ) -> Result<Option<DistanceRecord>, StoreError>;

    async fn find_distance(&self, job_id: i64) -> Result<Option<DistanceRecord>, StoreError>;
}

/// Read access to the user directory
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: i64) -> Result<User, StoreError>;

    async fn users_of_type(&self, user_type: i32) -> Result<Vec<User>, StoreError>;
}
