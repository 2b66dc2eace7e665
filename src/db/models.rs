use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle state of a booking
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Offered,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
    /// Only ever reported as the target of a reopen; reopened jobs are stored as `Pending`.
    Reopened,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Pending,
        JobStatus::Offered,
        JobStatus::Accepted,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Cancelled,
        JobStatus::Reopened,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Offered => "offered",
            JobStatus::Accepted => "accepted",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Reopened => "reopened",
        }
    }

    /// Completed and cancelled jobs never move again
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown job status: {}", s))
    }
}

/// A booking tracked through its lifecycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: i64,
    pub status: JobStatus,
    pub customer_id: i64,
    pub translator_id: Option<i64>,
    pub language: String,
    pub due_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub session_time: Option<String>,
    pub flagged: bool,
    pub admin_comment: Option<String>,
    pub customer_email: Option<String>,
    pub reference: Option<String>,
    pub no_show: bool,
    pub manually_handled: bool,
    pub by_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Checks the flag/comment invariant on a (possibly merged) record
    pub fn check_invariants(&self) -> Result<(), String> {
        let has_comment = self
            .admin_comment
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if self.flagged && !has_comment {
            return Err("Please, add comment: a flagged job requires an admin comment".to_string());
        }
        if matches!(self.status, JobStatus::InProgress | JobStatus::Completed)
            && self.translator_id.is_none()
        {
            return Err(format!(
                "job {} cannot be {} without an assigned translator",
                self.id, self.status
            ));
        }
        Ok(())
    }

    pub fn involves(&self, user_id: i64) -> bool {
        self.customer_id == user_id || self.translator_id == Some(user_id)
    }
}

/// Data required to create a job; everything else starts at its default
#[derive(Debug, Clone)]
pub struct NewJob {
    pub customer_id: i64,
    pub language: String,
    pub due_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub customer_email: Option<String>,
    pub reference: Option<String>,
}

/// Partial update of a job. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub language: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub session_time: Option<String>,
    pub flagged: Option<bool>,
    pub admin_comment: Option<String>,
    pub customer_email: Option<String>,
    pub reference: Option<String>,
    pub manually_handled: Option<bool>,
    pub by_admin: Option<bool>,
}

impl JobPatch {
    pub fn is_empty(&self) -> bool {
        self.language.is_none()
            && self.due_at.is_none()
            && self.duration_minutes.is_none()
            && self.session_time.is_none()
            && self.flagged.is_none()
            && self.admin_comment.is_none()
            && self.customer_email.is_none()
            && self.reference.is_none()
            && self.manually_handled.is_none()
            && self.by_admin.is_none()
    }

    /// Returns a copy of `job` with the supplied fields applied
    pub fn apply_to(&self, job: &Job) -> Job {
        let mut merged = job.clone();
        if let Some(language) = &self.language {
            merged.language = language.clone();
        }
        if let Some(due_at) = self.due_at {
            merged.due_at = Some(due_at);
        }
        if let Some(minutes) = self.duration_minutes {
            merged.duration_minutes = Some(minutes);
        }
        if let Some(session) = &self.session_time {
            merged.session_time = Some(session.clone());
        }
        if let Some(flagged) = self.flagged {
            merged.flagged = flagged;
        }
        if let Some(comment) = &self.admin_comment {
            merged.admin_comment = Some(comment.clone());
        }
        if let Some(email) = &self.customer_email {
            merged.customer_email = Some(email.clone());
        }
        if let Some(reference) = &self.reference {
            merged.reference = Some(reference.clone());
        }
        if let Some(handled) = self.manually_handled {
            merged.manually_handled = handled;
        }
        if let Some(by_admin) = self.by_admin {
            merged.by_admin = by_admin;
        }
        merged
    }
}

/// Status change applied by a conditional transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: JobStatus,
    pub translator: TranslatorChange,
    pub no_show: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslatorChange {
    Keep,
    Assign(i64),
    Clear,
}

impl StatusChange {
    pub fn to(status: JobStatus) -> Self {
        Self {
            status,
            translator: TranslatorChange::Keep,
            no_show: false,
        }
    }

    pub fn assign(mut self, translator_id: i64) -> Self {
        self.translator = TranslatorChange::Assign(translator_id);
        self
    }

    pub fn clear_translator(mut self) -> Self {
        self.translator = TranslatorChange::Clear;
        self
    }

    pub fn no_show(mut self) -> Self {
        self.no_show = true;
        self
    }

    /// Applies the change to a job whose current status was already checked
    pub fn apply_to(&self, job: &Job, now: DateTime<Utc>) -> Job {
        let mut next = job.clone();
        next.status = self.status;
        match self.translator {
            TranslatorChange::Keep => {}
            TranslatorChange::Assign(id) => next.translator_id = Some(id),
            TranslatorChange::Clear => next.translator_id = None,
        }
        if self.no_show {
            next.no_show = true;
        }
        next.updated_at = now;
        next
    }
}

/// Filter for full listings; unset fields match everything
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub language: Option<String>,
    pub customer_id: Option<i64>,
    pub translator_id: Option<i64>,
    pub flagged: Option<bool>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        self.status.is_none_or(|s| job.status == s)
            && self.language.as_ref().is_none_or(|l| &job.language == l)
            && self.customer_id.is_none_or(|c| job.customer_id == c)
            && self.translator_id.is_none_or(|t| job.translator_id == Some(t))
            && self.flagged.is_none_or(|f| job.flagged == f)
    }
}

/// Database representation of a job
#[derive(Debug, FromRow)]
pub struct JobRow {
    pub id: i64,
    pub status: String,
    pub customer_id: i64,
    pub translator_id: Option<i64>,
    pub language: String,
    pub due_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub session_time: Option<String>,
    pub flagged: bool,
    pub admin_comment: Option<String>,
    pub customer_email: Option<String>,
    pub reference: Option<String>,
    pub no_show: bool,
    pub manually_handled: bool,
    pub by_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = String;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            status: row.status.parse()?,
            customer_id: row.customer_id,
            translator_id: row.translator_id,
            language: row.language,
            due_at: row.due_at,
            duration_minutes: row.duration_minutes,
            session_time: row.session_time,
            flagged: row.flagged,
            admin_comment: row.admin_comment,
            customer_email: row.customer_email,
            reference: row.reference,
            no_show: row.no_show,
            manually_handled: row.manually_handled,
            by_admin: row.by_admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Distance and travel time reported for a job
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DistanceRecord {
    pub job_id: i64,
    pub distance: Option<f64>,
    pub time: Option<f64>,
}

/// A user known to the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub user_type: i32,
    pub languages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        let now = Utc::now();
        Job {
            id: 1,
            status: JobStatus::Pending,
            customer_id: 10,
            translator_id: None,
            language: "sv".to_string(),
            due_at: None,
            duration_minutes: Some(60),
            session_time: None,
            flagged: false,
            admin_comment: None,
            customer_email: None,
            reference: None,
            no_show: false,
            manually_handled: false,
            by_admin: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn status_parses_its_own_names() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn flagged_without_comment_breaks_invariant() {
        let patch = JobPatch {
            flagged: Some(true),
            admin_comment: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(patch.apply_to(&job()).check_invariants().is_err());

        let patch = JobPatch {
            flagged: Some(true),
            admin_comment: Some("late arrival".to_string()),
            ..Default::default()
        };
        assert!(patch.apply_to(&job()).check_invariants().is_ok());
    }

    #[test]
    fn completed_requires_translator() {
        let mut j = job();
        j.status = JobStatus::Completed;
        assert!(j.check_invariants().is_err());
        j.translator_id = Some(7);
        assert!(j.check_invariants().is_ok());
    }

    #[test]
    fn patch_only_touches_supplied_fields() {
        let original = job();
        let patch = JobPatch {
            session_time: Some("01:30".to_string()),
            ..Default::default()
        };
        let merged = patch.apply_to(&original);
        assert_eq!(merged.session_time.as_deref(), Some("01:30"));
        assert_eq!(merged.language, original.language);
        assert_eq!(merged.duration_minutes, original.duration_minutes);
    }
}
