use serde::Serialize;

use crate::db::models::{DistanceRecord, Job, JobStatus};
use crate::notify::DeliveryStatus;

/// Response for single job creation or update
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub message: String,
    pub job: Job,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub count: usize,
    pub jobs: Vec<Job>,
}

impl From<Vec<Job>> for JobListResponse {
    fn from(jobs: Vec<Job>) -> Self {
        Self {
            count: jobs.len(),
            jobs,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub page: u32,
    pub per_page: usize,
    pub total: usize,
    pub jobs: Vec<Job>,
}

impl HistoryResponse {
    pub fn empty() -> Self {
        Self {
            page: 1,
            per_page: 0,
            total: 0,
            jobs: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobDetailsResponse {
    pub job: Job,
    pub distance: Option<DistanceRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Result of a state-machine move. Notification failures ride along as
/// warnings and never turn the outcome into an error.
#[derive(Debug, Serialize)]
pub struct DispatchOutcome {
    pub message: String,
    pub job: Job,
    pub transition: Transition,
    pub notifications: Vec<DeliveryStatus>,
}

impl DispatchOutcome {
    pub fn has_delivery_failures(&self) -> bool {
        self.notifications.iter().any(|status| !status.success)
    }
}

/// Response for manual notification resends. `success` carries the failure
/// reason when delivery did not go through.
#[derive(Debug, Serialize)]
pub struct ResendResponse {
    pub success: String,
    pub delivery: Vec<DeliveryStatus>,
}

#[derive(Debug, Serialize)]
pub struct DistanceFeedResponse {
    pub message: String,
    pub distance: Option<DistanceRecord>,
    pub job: Job,
}
