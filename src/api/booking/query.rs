use tracing::{debug, info, warn};

use crate::api::caller::Caller;
use crate::db::models::{Job, JobFilter, JobStatus, StatusChange};
use crate::db::StoreError;

use super::dto::{HistoryResponse, JobDetailsResponse, JobListResponse};
use super::error::ServiceError;
use super::service::BookingService;

pub const HISTORY_PAGE_SIZE: usize = 15;

impl BookingService {
    /// Full listing for elevated callers. Regular callers get the jobs of
    /// `user_id` when one is given and `Forbidden` otherwise.
    pub async fn get_all(
        &self,
        caller: &Caller,
        filter: &JobFilter,
        user_id: Option<i64>,
    ) -> Result<JobListResponse, ServiceError> {
        if caller.is_elevated() {
            info!("Service: Listing all jobs for admin {}", caller.user_id);
            return Ok(self.jobs.list_all(filter).await?.into());
        }

        match user_id {
            Some(user_id) => Ok(self.jobs.list_by_user(user_id).await?.into()),
            None => Err(ServiceError::Forbidden(format!(
                "user {} may not list all jobs",
                caller.user_id
            ))),
        }
    }

    /// Finished jobs of a user, oldest first. No user id yields an empty page.
    ///
    /// Regular callers may only read their own history.
    pub async fn get_history(
        &self,
        caller: &Caller,
        user_id: Option<i64>,
        page: Option<u32>,
    ) -> Result<HistoryResponse, ServiceError> {
        let Some(user_id) = user_id else {
            debug!("Service: History requested without user_id");
            return Ok(HistoryResponse::empty());
        };
        if !caller.is_elevated() && caller.user_id != user_id {
            return Err(ServiceError::Forbidden(format!(
                "user {} may not read the history of user {}",
                caller.user_id, user_id
            )));
        }

        let mut finished: Vec<Job> = self
            .jobs
            .list_by_user(user_id)
            .await?
            .into_iter()
            .filter(|job| job.status.is_terminal())
            .collect();
        finished.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let page = page.unwrap_or(1).max(1);
        let total = finished.len();
        let jobs = finished
            .into_iter()
            .skip((page as usize - 1) * HISTORY_PAGE_SIZE)
            .take(HISTORY_PAGE_SIZE)
            .collect();

        Ok(HistoryResponse {
            page,
            per_page: HISTORY_PAGE_SIZE,
            total,
            jobs,
        })
    }

    /// Open jobs the calling translator may take. Jobs still `Pending` are
    /// moved to `Offered` as they are surfaced, and the offer is pushed to
    /// every eligible translator like an explicit offer.
    pub async fn get_potential_jobs(
        &self,
        caller: &Caller,
    ) -> Result<JobListResponse, ServiceError> {
        let translator = self.translator_profile(caller).await?;

        let open = self.jobs.list_all(&JobFilter::default()).await?;
        let mut potential = Vec::new();
        for job in open {
            if job.translator_id.is_some()
                || !matches!(job.status, JobStatus::Pending | JobStatus::Offered)
                || !self.policy.is_eligible(&translator, &job)
            {
                continue;
            }

            if job.status == JobStatus::Offered {
                potential.push(job);
                continue;
            }

            match self
                .jobs
                .transition(job.id, &[JobStatus::Pending], StatusChange::to(JobStatus::Offered))
                .await
            {
                Ok(offered) => {
                    let status = self.announce_offer(&offered).await;
                    if !status.success {
                        warn!(
                            "Service: offer push for job {} failed: {}",
                            offered.id,
                            status.reason.as_deref().unwrap_or("unknown")
                        );
                    }
                    potential.push(offered);
                }
                // Someone else moved it in between; only keep it if it is still open
                Err(StoreError::Conflict { current: JobStatus::Offered, .. }) => {
                    potential.push(self.jobs.find(job.id).await?)
                }
                Err(StoreError::Conflict { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            "Service: {} potential jobs for translator {}",
            potential.len(),
            translator.id
        );
        Ok(potential.into())
    }

    /// Job details with its distance record
    pub async fn show(
        &self,
        caller: &Caller,
        job_id: i64,
    ) -> Result<JobDetailsResponse, ServiceError> {
        let job = self.jobs.find(job_id).await?;

        let visible = caller.is_elevated()
            || job.involves(caller.user_id)
            || (caller.is_translator() && job.translator_id.is_none() && !job.status.is_terminal());
        if !visible {
            return Err(ServiceError::Forbidden(format!(
                "user {} may not view job {}",
                caller.user_id, job_id
            )));
        }

        let distance = self.distances.find_distance(job_id).await?;
        Ok(JobDetailsResponse { job, distance })
    }
}
