use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Transaction};
use tracing::debug;

use crate::db::models::{
    DistanceRecord, Job, JobFilter, JobPatch, JobRow, JobStatus, NewJob, StatusChange, User,
};
use crate::db::store::{DistanceStore, JobStore, StoreError, UserStore};

const JOB_COLUMNS: &str = "id, status, customer_id, translator_id, language, due_at, \
    duration_minutes, session_time, flagged, admin_comment, customer_email, reference, \
    no_show, manually_handled, by_admin, created_at, updated_at";

/// PostgreSQL-backed repository for jobs, distances and users
#[derive(Clone)]
pub struct JobRepository {
    pool: Pool<Postgres>,
}

impl JobRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    /// Reads a job and locks its row for the rest of the transaction
    async fn lock_job(
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<Job, StoreError> {
        let query = format!("SELECT {} FROM jobs WHERE id = $1 FOR UPDATE", JOB_COLUMNS);
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        Job::try_from(row).map_err(StoreError::Corrupt)
    }

    /// Writes every mutable column of `job` back to its row
    async fn write_job(
        tx: &mut Transaction<'_, Postgres>,
        job: &Job,
    ) -> Result<Job, StoreError> {
        let query = format!(
            r#"
            UPDATE jobs
            SET status = $2, translator_id = $3, language = $4, due_at = $5,
                duration_minutes = $6, session_time = $7, flagged = $8,
                admin_comment = $9, customer_email = $10, reference = $11,
                no_show = $12, manually_handled = $13, by_admin = $14,
                updated_at = $15
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(job.id)
            .bind(job.status.as_str())
            .bind(job.translator_id)
            .bind(&job.language)
            .bind(job.due_at)
            .bind(job.duration_minutes)
            .bind(&job.session_time)
            .bind(job.flagged)
            .bind(&job.admin_comment)
            .bind(&job.customer_email)
            .bind(&job.reference)
            .bind(job.no_show)
            .bind(job.manually_handled)
            .bind(job.by_admin)
            .bind(Utc::now())
            .fetch_one(&mut **tx)
            .await?;
        Job::try_from(row).map_err(StoreError::Corrupt)
    }

    fn into_jobs(rows: Vec<JobRow>) -> Result<Vec<Job>, StoreError> {
        rows.into_iter()
            .map(|row| Job::try_from(row).map_err(StoreError::Corrupt))
            .collect()
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn create(&self, job: NewJob) -> Result<Job, StoreError> {
        debug!("Creating job: customer={}, language={}", job.customer_id, job.language);

        let query = format!(
            r#"
            INSERT INTO jobs (status, customer_id, language, due_at, duration_minutes,
                              customer_email, reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            JOB_COLUMNS
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(JobStatus::Pending.as_str())
            .bind(job.customer_id)
            .bind(&job.language)
            .bind(job.due_at)
            .bind(job.duration_minutes)
            .bind(&job.customer_email)
            .bind(&job.reference)
            .fetch_one(&self.pool)
            .await?;

        debug!("Job created with id={}", row.id);
        Job::try_from(row).map_err(StoreError::Corrupt)
    }

    async fn find(&self, id: i64) -> Result<Job, StoreError> {
        let query = format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS);
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        Job::try_from(row).map_err(StoreError::Corrupt)
    }

    async fn update(&self, id: i64, patch: JobPatch) -> Result<Job, StoreError> {
        let mut tx = self.pool.begin().await?;
        let current = Self::lock_job(&mut tx, id).await?;

        let merged = patch.apply_to(&current);
        // Dropping the transaction rolls it back, so a rejected patch writes nothing
        merged.check_invariants().map_err(StoreError::Validation)?;

        let job = Self::write_job(&mut tx, &merged).await?;
        tx.commit().await?;
        Ok(job)
    }

    async fn transition(
        &self,
        id: i64,
        expected: &[JobStatus],
        change: StatusChange,
    ) -> Result<Job, StoreError> {
        let mut tx = self.pool.begin().await?;
        let current = Self::lock_job(&mut tx, id).await?;

        if !expected.contains(&current.status) {
            return Err(StoreError::Conflict {
                id,
                current: current.status,
            });
        }

        let next = change.apply_to(&current, Utc::now());
        next.check_invariants().map_err(StoreError::Validation)?;

        let job = Self::write_job(&mut tx, &next).await?;
        tx.commit().await?;
        debug!("Job {} moved {} -> {}", id, current.status, job.status);
        Ok(job)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Job>, StoreError> {
        let query = format!(
            "SELECT {} FROM jobs WHERE customer_id = $1 OR translator_id = $1 \
             ORDER BY created_at DESC, id DESC",
            JOB_COLUMNS
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Self::into_jobs(rows)
    }

    async fn list_all(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
        let query = format!(
            r#"
            SELECT {} FROM jobs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR language = $2)
              AND ($3::bigint IS NULL OR customer_id = $3)
              AND ($4::bigint IS NULL OR translator_id = $4)
              AND ($5::boolean IS NULL OR flagged = $5)
            ORDER BY created_at DESC, id DESC
            "#,
            JOB_COLUMNS
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(&filter.language)
            .bind(filter.customer_id)
            .bind(filter.translator_id)
            .bind(filter.flagged)
            .fetch_all(&self.pool)
            .await?;
        Self::into_jobs(rows)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DistanceStore for JobRepository {
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

        let record = sqlx::query_as::<_, DistanceRecord>(
            r#"
            INSERT INTO distances (job_id, distance, travel_time)
            VALUES ($1, $2, $3)
            ON CONFLICT (job_id) DO UPDATE
            SET distance = COALESCE(EXCLUDED.distance, distances.distance),
                travel_time = COALESCE(EXCLUDED.travel_time, distances.travel_time)
            RETURNING job_id, distance, travel_time AS time
            "#,
        )
        .bind(job_id)
        .bind(distance)
        .bind(time)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(record))
    }

    async fn find_distance(&self, job_id: i64) -> Result<Option<DistanceRecord>, StoreError> {
        let record = sqlx::query_as::<_, DistanceRecord>(
            "SELECT job_id, distance, travel_time AS time FROM distances WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

#[async_trait]
impl UserStore for JobRepository {
    async fn find_user(&self, id: i64) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, phone, user_type, languages FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::UserNotFound(id))
    }

    async fn users_of_type(&self, user_type: i32) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, name, phone, user_type, languages FROM users \
             WHERE user_type = $1 ORDER BY id",
        )
        .bind(user_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}
