use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use validator::Validate;

use crate::api::caller::Caller;
use crate::api::validation::summarize;
use crate::config::{Role, RoleConfig};
use crate::db::models::{Job, JobPatch, JobStatus, NewJob, StatusChange, User};
use crate::db::{DistanceStore, JobStore, StoreError, UserStore};
use crate::matching::EligibilityPolicy;
use crate::notify::{
    DeliveryStatus, NotificationDispatcher, NotificationKind, NotificationPayload,
    NotificationTransport, Recipient,
};

use super::dto::{DispatchOutcome, DistanceFeedResponse, JobResponse, ResendResponse, Transition};
use super::error::ServiceError;
use super::models::{
    CreateJobRequest, DistanceFeedRequest, ImmediateJobEmailRequest, UpdateJobRequest,
};

/// States a job can be reopened from
const REOPENABLE: [JobStatus; 4] = [
    JobStatus::Pending,
    JobStatus::Offered,
    JobStatus::Accepted,
    JobStatus::InProgress,
];

/// States in which the job has not started yet
const CANCELLABLE: [JobStatus; 3] = [JobStatus::Pending, JobStatus::Offered, JobStatus::Accepted];

/// Booking service: the job dispatch state machine plus the read paths in `query.rs`.
///
/// Every state change goes through `JobStore::transition`, which compares and
/// swaps on the current status. Notifications are sent after the change is
/// committed and cannot undo it.
pub struct BookingService {
    pub(super) jobs: Arc<dyn JobStore>,
    pub(super) distances: Arc<dyn DistanceStore>,
    pub(super) users: Arc<dyn UserStore>,
    pub(super) policy: Arc<dyn EligibilityPolicy>,
    pub(super) notifier: NotificationDispatcher,
    pub(super) roles: RoleConfig,
}

impl BookingService {
    /// Create a BookingService over a store that holds jobs, distances and users
    pub fn new<S>(
        store: Arc<S>,
        transport: Arc<dyn NotificationTransport>,
        policy: Arc<dyn EligibilityPolicy>,
        roles: RoleConfig,
        notification_timeout: Duration,
    ) -> Self
    where
        S: JobStore + DistanceStore + UserStore + 'static,
    {
        let notifier = NotificationDispatcher::new(
            transport,
            store.clone(),
            policy.clone(),
            roles,
            notification_timeout,
        );
        Self {
            jobs: store.clone(),
            distances: store.clone(),
            users: store,
            policy,
            notifier,
            roles,
        }
    }

    pub fn roles(&self) -> &RoleConfig {
        &self.roles
    }

    pub async fn ping(&self) -> Result<(), ServiceError> {
        self.jobs.ping().await.map_err(ServiceError::from)
    }

    fn require_owner_or_elevated(
        caller: &Caller,
        job: &Job,
        action: &str,
    ) -> Result<(), ServiceError> {
        if caller.is_elevated() || job.customer_id == caller.user_id {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "user {} may not {} job {}",
                caller.user_id, action, job.id
            )))
        }
    }

    fn require_translator(caller: &Caller) -> Result<(), ServiceError> {
        if caller.is_translator() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "user {} is not a translator",
                caller.user_id
            )))
        }
    }

    fn validate<T: Validate>(input: &T) -> Result<(), ServiceError> {
        input
            .validate()
            .map_err(|errors| ServiceError::ValidationFailed(summarize(&errors)))
    }

    pub(super) async fn translator_profile(&self, caller: &Caller) -> Result<User, ServiceError> {
        Self::require_translator(caller)?;
        Ok(self.users.find_user(caller.user_id).await?)
    }

    async fn move_job(
        &self,
        job_id: i64,
        expected: &[JobStatus],
        change: StatusChange,
    ) -> Result<Job, ServiceError> {
        self.jobs
            .transition(job_id, expected, change)
            .await
            .map_err(|e| ServiceError::from_transition(e, change.status))
    }

    async fn notify(
        &self,
        job: &Job,
        kind: NotificationKind,
        recipient: Recipient,
        message: String,
    ) -> DeliveryStatus {
        let payload = NotificationPayload {
            kind,
            job_id: job.id,
            message,
        };
        self.notifier.send_push(job, payload, recipient).await
    }

    /// Pushes the offer to every eligible translator
    pub(super) async fn announce_offer(&self, job: &Job) -> DeliveryStatus {
        self.notify(
            job,
            NotificationKind::JobOffered,
            Recipient::Broadcast,
            format!("New {} booking #{} is available", job.language, job.id),
        )
        .await
    }

    fn outcome(
        message: &str,
        job: Job,
        from: JobStatus,
        to: JobStatus,
        notifications: Vec<DeliveryStatus>,
    ) -> DispatchOutcome {
        let outcome = DispatchOutcome {
            message: message.to_string(),
            job,
            transition: Transition { from, to },
            notifications,
        };
        if outcome.has_delivery_failures() {
            warn!(
                "Service: job {} moved {} -> {} but some notifications failed",
                outcome.job.id, from, to
            );
        }
        outcome
    }

    /// Create a booking in `Pending`
    ///
    /// Customers book for themselves; elevated callers must name the customer.
    pub async fn create_job(
        &self,
        caller: &Caller,
        request: CreateJobRequest,
    ) -> Result<JobResponse, ServiceError> {
        Self::validate(&request)?;

        let customer_id = if caller.is_elevated() {
            request.customer_id.ok_or_else(|| {
                ServiceError::ValidationFailed(
                    "customer_id is required when booking on behalf of a customer".to_string(),
                )
            })?
        } else if caller.role == Role::Customer {
            caller.user_id
        } else {
            return Err(ServiceError::Forbidden(format!(
                "user {} may not create bookings",
                caller.user_id
            )));
        };

        info!("Service: Creating job for customer={} language={}", customer_id, request.language);

        let job = self
            .jobs
            .create(NewJob {
                customer_id,
                language: request.language,
                due_at: request.due_at,
                duration_minutes: request.duration_minutes,
                customer_email: request.customer_email,
                reference: request.reference,
            })
            .await?;

        info!("Service: Job created successfully with id={}", job.id);
        Ok(JobResponse {
            message: "Job created successfully".to_string(),
            job,
        })
    }

    /// Partial update. Flag and admin comment are reserved for elevated callers.
    pub async fn update_job(
        &self,
        caller: &Caller,
        job_id: i64,
        request: UpdateJobRequest,
    ) -> Result<JobResponse, ServiceError> {
        Self::validate(&request)?;

        let job = self.jobs.find(job_id).await?;
        Self::require_owner_or_elevated(caller, &job, "update")?;
        if request.touches_admin_fields() && !caller.is_elevated() {
            return Err(ServiceError::Forbidden(
                "only administrators may flag jobs or comment on them".to_string(),
            ));
        }

        let patch = request.into_patch();
        if patch.is_empty() {
            return Ok(JobResponse {
                message: "Nothing to update".to_string(),
                job,
            });
        }

        let job = self.jobs.update(job_id, patch).await?;
        info!("Service: Job {} updated by user {}", job_id, caller.user_id);
        Ok(JobResponse {
            message: "Job updated successfully".to_string(),
            job,
        })
    }

    /// Pending -> Offered, broadcasting the offer to every eligible translator
    pub async fn offer_job(
        &self,
        caller: &Caller,
        job_id: i64,
    ) -> Result<DispatchOutcome, ServiceError> {
        let job = self.jobs.find(job_id).await?;
        Self::require_owner_or_elevated(caller, &job, "offer")?;
        self.broadcast_offer(job_id).await
    }

    async fn broadcast_offer(&self, job_id: i64) -> Result<DispatchOutcome, ServiceError> {
        let job = self
            .move_job(job_id, &[JobStatus::Pending], StatusChange::to(JobStatus::Offered))
            .await?;

        let status = self.announce_offer(&job).await;

        info!("Service: Job {} offered", job_id);
        Ok(Self::outcome("Job offered", job, JobStatus::Pending, JobStatus::Offered, vec![status]))
    }

    /// Records the customer's contact email on a job and offers it immediately
    pub async fn immediate_job_email(
        &self,
        caller: &Caller,
        request: ImmediateJobEmailRequest,
    ) -> Result<DispatchOutcome, ServiceError> {
        Self::validate(&request)?;

        let job = self.jobs.find(request.job_id).await?;
        Self::require_owner_or_elevated(caller, &job, "update")?;
        if job.status != JobStatus::Pending {
            return Err(ServiceError::InvalidTransition {
                from: job.status,
                to: JobStatus::Offered,
            });
        }

        let patch = JobPatch {
            customer_email: Some(request.customer_email),
            reference: request.reference,
            ..Default::default()
        };
        self.jobs.update(request.job_id, patch).await?;
        self.broadcast_offer(request.job_id).await
    }

    /// Offered -> Accepted. The first translator to accept wins.
    pub async fn accept_job(
        &self,
        caller: &Caller,
        job_id: i64,
    ) -> Result<DispatchOutcome, ServiceError> {
        let translator = self.translator_profile(caller).await?;
        let job = self.jobs.find(job_id).await?;

        if job.translator_id.is_none() && !self.policy.is_eligible(&translator, &job) {
            return Err(ServiceError::Forbidden(format!(
                "translator {} is not eligible for job {}",
                translator.id, job_id
            )));
        }

        let accepted = self
            .jobs
            .transition(
                job_id,
                &[JobStatus::Offered],
                StatusChange::to(JobStatus::Accepted).assign(translator.id),
            )
            .await
            .map_err(|e| match e {
                StoreError::Conflict { current, .. }
                    if matches!(
                        current,
                        JobStatus::Accepted | JobStatus::InProgress | JobStatus::Completed
                    ) =>
                {
                    ServiceError::AlreadyTaken(job_id)
                }
                other => ServiceError::from_transition(other, JobStatus::Accepted),
            })?;

        info!("Service: Job {} accepted by translator {}", job_id, translator.id);

        let status = self
            .notify(
                &accepted,
                NotificationKind::JobAccepted,
                Recipient::User(accepted.customer_id),
                format!("{} accepted your booking #{}", translator.name, accepted.id),
            )
            .await;

        Ok(Self::outcome(
            "Job accepted",
            accepted,
            JobStatus::Offered,
            JobStatus::Accepted,
            vec![status],
        ))
    }

    /// Acceptance through a direct link. Same rules as `accept_job`.
    pub async fn accept_job_with_id(
        &self,
        caller: &Caller,
        job_id: i64,
    ) -> Result<DispatchOutcome, ServiceError> {
        let mut outcome = self.accept_job(caller, job_id).await?;
        outcome.message = format!("You have accepted booking #{}", job_id);
        Ok(outcome)
    }

    /// Cancels a job that has not started.
    ///
    /// The assigned translator cancelling their own job withdraws instead:
    /// the job goes back to `Pending` and is offered again.
    pub async fn cancel_job(
        &self,
        caller: &Caller,
        job_id: i64,
    ) -> Result<DispatchOutcome, ServiceError> {
        let job = self.jobs.find(job_id).await?;

        if caller.is_translator() && job.translator_id == Some(caller.user_id) {
            return self.withdraw(job).await;
        }
        Self::require_owner_or_elevated(caller, &job, "cancel")?;

        let cancelled = self
            .move_job(job_id, &CANCELLABLE, StatusChange::to(JobStatus::Cancelled))
            .await?;
        info!("Service: Job {} cancelled by user {}", job_id, caller.user_id);

        let mut notifications = Vec::new();
        if let Some(translator_id) = cancelled.translator_id {
            notifications.push(
                self.notify(
                    &cancelled,
                    NotificationKind::JobCancelled,
                    Recipient::User(translator_id),
                    format!("Booking #{} has been cancelled", cancelled.id),
                )
                .await,
            );
        }

        Ok(Self::outcome(
            "Job cancelled",
            cancelled,
            job.status,
            JobStatus::Cancelled,
            notifications,
        ))
    }

    async fn withdraw(&self, job: Job) -> Result<DispatchOutcome, ServiceError> {
        let withdrawn = self
            .move_job(
                job.id,
                &[JobStatus::Accepted],
                StatusChange::to(JobStatus::Pending).clear_translator(),
            )
            .await?;
        info!("Service: Translator withdrew from job {}", job.id);

        let notifications = vec![
            self.notify(
                &withdrawn,
                NotificationKind::JobWithdrawn,
                Recipient::User(withdrawn.customer_id),
                format!(
                    "The translator for booking #{} withdrew; we are finding a new one",
                    withdrawn.id
                ),
            )
            .await,
            self.announce_offer(&withdrawn).await,
        ];

        Ok(Self::outcome(
            "Job withdrawn",
            withdrawn,
            job.status,
            JobStatus::Pending,
            notifications,
        ))
    }

    /// Accepted -> InProgress
    pub async fn start_job(
        &self,
        caller: &Caller,
        job_id: i64,
    ) -> Result<DispatchOutcome, ServiceError> {
        let job = self.jobs.find(job_id).await?;
        if !caller.is_elevated() && job.translator_id != Some(caller.user_id) {
            return Err(ServiceError::Forbidden(format!(
                "only the assigned translator may start job {}",
                job_id
            )));
        }

        let started = self
            .move_job(job_id, &[JobStatus::Accepted], StatusChange::to(JobStatus::InProgress))
            .await?;

        let status = self
            .notify(
                &started,
                NotificationKind::JobStarted,
                Recipient::User(started.customer_id),
                format!("Booking #{} has started", started.id),
            )
            .await;

        Ok(Self::outcome(
            "Job started",
            started,
            JobStatus::Accepted,
            JobStatus::InProgress,
            vec![status],
        ))
    }

    /// Accepted/InProgress -> Completed. The other party is notified.
    pub async fn end_job(
        &self,
        caller: &Caller,
        job_id: i64,
    ) -> Result<DispatchOutcome, ServiceError> {
        let job = self.jobs.find(job_id).await?;
        if !caller.is_elevated() && !job.involves(caller.user_id) {
            return Err(ServiceError::Forbidden(format!(
                "user {} is not part of job {}",
                caller.user_id, job_id
            )));
        }

        let ended = self
            .move_job(
                job_id,
                &[JobStatus::Accepted, JobStatus::InProgress],
                StatusChange::to(JobStatus::Completed),
            )
            .await?;
        info!("Service: Job {} completed", job_id);

        let recipient = match ended.translator_id {
            Some(translator_id) if caller.user_id == ended.customer_id => {
                Recipient::User(translator_id)
            }
            _ => Recipient::User(ended.customer_id),
        };
        let status = self
            .notify(
                &ended,
                NotificationKind::JobCompleted,
                recipient,
                format!("Booking #{} has ended", ended.id),
            )
            .await;

        Ok(Self::outcome("Job ended", ended, job.status, JobStatus::Completed, vec![status]))
    }

    /// Accepted/InProgress -> Cancelled, marking the customer as a no-show
    pub async fn customer_not_call(
        &self,
        caller: &Caller,
        job_id: i64,
    ) -> Result<DispatchOutcome, ServiceError> {
        let job = self.jobs.find(job_id).await?;
        if !caller.is_elevated() && job.translator_id != Some(caller.user_id) {
            return Err(ServiceError::Forbidden(format!(
                "only the assigned translator may report a no-show for job {}",
                job_id
            )));
        }

        let closed = self
            .move_job(
                job_id,
                &[JobStatus::Accepted, JobStatus::InProgress],
                StatusChange::to(JobStatus::Cancelled).no_show(),
            )
            .await?;
        info!("Service: Job {} closed as customer no-show", job_id);

        let status = self
            .notify(
                &closed,
                NotificationKind::CustomerNoShow,
                Recipient::User(closed.customer_id),
                format!(
                    "Booking #{} was closed because the customer could not be reached",
                    closed.id
                ),
            )
            .await;

        Ok(Self::outcome(
            "Job closed as customer no-show",
            closed,
            job.status,
            JobStatus::Cancelled,
            vec![status],
        ))
    }

    /// Any non-terminal state -> Reopened. The translator is cleared and the
    /// job is stored as `Pending` again.
    pub async fn reopen(
        &self,
        caller: &Caller,
        job_id: i64,
    ) -> Result<DispatchOutcome, ServiceError> {
        let job = self.jobs.find(job_id).await?;
        Self::require_owner_or_elevated(caller, &job, "reopen")?;

        let reopened = self
            .jobs
            .transition(
                job_id,
                &REOPENABLE,
                StatusChange::to(JobStatus::Pending).clear_translator(),
            )
            .await
            .map_err(|e| ServiceError::from_transition(e, JobStatus::Reopened))?;
        info!("Service: Job {} reopened", job_id);

        let mut notifications = Vec::new();
        if let Some(previous) = job.translator_id {
            notifications.push(
                self.notify(
                    &reopened,
                    NotificationKind::JobReopened,
                    Recipient::User(previous),
                    format!(
                        "Booking #{} was reopened and is no longer assigned to you",
                        reopened.id
                    ),
                )
                .await,
            );
        }
        notifications.push(
            self.notify(
                &reopened,
                NotificationKind::JobReopened,
                Recipient::Broadcast,
                format!("Booking #{} is available again", reopened.id),
            )
            .await,
        );

        Ok(Self::outcome("Job reopened", reopened, job.status, JobStatus::Reopened, notifications))
    }

    /// Re-sends the offer push to every eligible translator
    pub async fn resend_notifications(
        &self,
        caller: &Caller,
        job_id: i64,
    ) -> Result<ResendResponse, ServiceError> {
        let job = self.jobs.find(job_id).await?;
        Self::require_owner_or_elevated(caller, &job, "notify about")?;

        let status = self.announce_offer(&job).await;

        Ok(Self::resend_response("Push sent", vec![status]))
    }

    /// Texts the assigned translator, or every eligible translator when the
    /// job is unassigned. Delivery failures are reported, not raised.
    pub async fn resend_sms_notifications(
        &self,
        caller: &Caller,
        job_id: i64,
    ) -> Result<ResendResponse, ServiceError> {
        let job = self.jobs.find(job_id).await?;
        Self::require_owner_or_elevated(caller, &job, "notify about")?;

        let translators = match job.translator_id {
            Some(id) => self
                .users
                .find_user(id)
                .await
                .map(|user| vec![user])
                .map_err(|e| e.to_string()),
            None => self.notifier.eligible_translators(&job).await.map_err(|e| e.to_string()),
        };

        let translators = match translators {
            Ok(translators) => translators,
            Err(reason) => {
                warn!(
                    "Service: SMS resend for job {} could not resolve translators: {}",
                    job_id, reason
                );
                return Ok(ResendResponse {
                    success: reason,
                    delivery: Vec::new(),
                });
            }
        };

        let mut delivery = Vec::with_capacity(translators.len());
        for translator in &translators {
            delivery.push(self.notifier.send_sms(&job, translator).await);
        }

        Ok(Self::resend_response("SMS sent", delivery))
    }

    fn resend_response(sent: &str, delivery: Vec<DeliveryStatus>) -> ResendResponse {
        let failure = delivery
            .iter()
            .find(|status| !status.success)
            .and_then(|status| status.reason.clone());
        ResendResponse {
            success: failure.unwrap_or_else(|| sent.to_string()),
            delivery,
        }
    }

    /// Records distance/time and post-job details.
    ///
    /// The job is written first. The store re-checks the flag/comment rule
    /// against the current row, so a rejected feed leaves both the distance
    /// record and the job untouched.
    pub async fn distance_feed(
        &self,
        caller: &Caller,
        request: DistanceFeedRequest,
    ) -> Result<DistanceFeedResponse, ServiceError> {
        Self::validate(&request)?;

        let job = self.jobs.find(request.job_id).await?;
        if !caller.is_elevated() && job.translator_id != Some(caller.user_id) {
            return Err(ServiceError::Forbidden(format!(
                "user {} may not report on job {}",
                caller.user_id, request.job_id
            )));
        }

        let patch = request.job_patch();
        patch
            .apply_to(&job)
            .check_invariants()
            .map_err(ServiceError::ValidationFailed)?;

        let job = if patch.is_empty() {
            job
        } else {
            self.jobs.update(request.job_id, patch).await?
        };

        let distance = match self
            .distances
            .upsert(request.job_id, request.distance, request.time)
            .await?
        {
            Some(record) => Some(record),
            None => self.distances.find_distance(request.job_id).await?,
        };

        Ok(DistanceFeedResponse {
            message: "Record updated!".to_string(),
            distance,
            job,
        })
    }
}
