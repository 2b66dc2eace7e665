use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use validator::Validate;

use crate::db::models::{JobFilter, JobPatch, JobStatus};

/// Accepts a number, a numeric string, or an empty string (treated as absent)
fn number_or_empty<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    let n = match Option::<Raw>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Raw::Number(n)) => n,
        Some(Raw::Text(s)) if s.trim().is_empty() => return Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("not a number: {}", s)))?,
    };

    // NaN and infinities serialize as null
    if !n.is_finite() {
        return Err(serde::de::Error::custom(format!("not a finite number: {}", n)));
    }
    Ok(Some(n))
}

/// Empty strings count as absent
fn text_or_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.trim().is_empty()))
}

/// Accepts `true`/`false` as booleans or strings; empty string is absent
fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Bool(b)) => Ok(Some(b)),
        Some(Raw::Text(s)) => match s.trim() {
            "" => Ok(None),
            "true" | "yes" => Ok(Some(true)),
            "false" | "no" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!("not a flag: {}", other))),
        },
    }
}

/// Booking request from a customer, or from an admin on a customer's behalf
#[derive(Deserialize, Debug, Validate)]
pub struct CreateJobRequest {
    pub customer_id: Option<i64>,
    #[validate(length(min = 2, max = 32, message = "Language must be between 2 and 32 characters"))]
    pub language: String,
    pub due_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes"))]
    pub duration_minutes: Option<i32>,
    #[validate(email(message = "Customer email must be a valid email address"))]
    pub customer_email: Option<String>,
    pub reference: Option<String>,
}

#[derive(Deserialize, Debug, Default, Validate)]
pub struct UpdateJobRequest {
    #[validate(length(min = 2, max = 32, message = "Language must be between 2 and 32 characters"))]
    pub language: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be between 1 and 1440 minutes"))]
    pub duration_minutes: Option<i32>,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub session_time: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub flagged: Option<bool>,
    #[serde(default, alias = "admincomment")]
    pub admin_comment: Option<String>,
    #[validate(email(message = "Customer email must be a valid email address"))]
    pub customer_email: Option<String>,
    pub reference: Option<String>,
}

impl UpdateJobRequest {
    /// Fields only administrators may change
    pub fn touches_admin_fields(&self) -> bool {
        self.flagged.is_some() || self.admin_comment.is_some()
    }

    pub fn into_patch(self) -> JobPatch {
        JobPatch {
            language: self.language,
            due_at: self.due_at,
            duration_minutes: self.duration_minutes,
            session_time: self.session_time,
            flagged: self.flagged,
            admin_comment: self.admin_comment,
            customer_email: self.customer_email,
            reference: self.reference,
            ..Default::default()
        }
    }
}

/// Request body naming a single job
#[derive(Deserialize, Debug, Validate)]
pub struct JobActionRequest {
    #[serde(alias = "jobid")]
    #[validate(range(min = 1, message = "job_id must be a positive id"))]
    pub job_id: i64,
}

#[derive(Deserialize, Debug, Validate)]
pub struct ImmediateJobEmailRequest {
    #[serde(alias = "jobid")]
    #[validate(range(min = 1, message = "job_id must be a positive id"))]
    pub job_id: i64,
    #[serde(alias = "user_email")]
    #[validate(email(message = "Customer email must be a valid email address"))]
    pub customer_email: String,
    pub reference: Option<String>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct DistanceFeedRequest {
    #[serde(alias = "jobid")]
    #[validate(range(min = 1, message = "job_id must be a positive id"))]
    pub job_id: i64,
    #[serde(default, deserialize_with = "number_or_empty")]
    #[validate(range(min = 0.0, message = "Distance cannot be negative"))]
    pub distance: Option<f64>,
    #[serde(default, deserialize_with = "number_or_empty")]
    #[validate(range(min = 0.0, message = "Time cannot be negative"))]
    pub time: Option<f64>,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub session_time: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub flagged: Option<bool>,
    #[serde(default, alias = "admincomment")]
    pub admin_comment: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub manually_handled: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    pub by_admin: Option<bool>,
}

impl DistanceFeedRequest {
    pub fn job_patch(&self) -> JobPatch {
        JobPatch {
            session_time: self.session_time.clone(),
            flagged: self.flagged,
            admin_comment: self.admin_comment.clone(),
            manually_handled: self.manually_handled,
            by_admin: self.by_admin,
            ..Default::default()
        }
    }
}

#[derive(Deserialize, Debug, Validate)]
pub struct IndexQuery {
    pub user_id: Option<i64>,
    pub status: Option<JobStatus>,
    pub language: Option<String>,
    pub customer_id: Option<i64>,
    pub translator_id: Option<i64>,
    pub flagged: Option<bool>,
}

impl IndexQuery {
    pub fn filter(&self) -> JobFilter {
        JobFilter {
            status: self.status,
            language: self.language.clone(),
            customer_id: self.customer_id,
            translator_id: self.translator_id,
            flagged: self.flagged,
        }
    }
}

#[derive(Deserialize, Debug, Validate)]
pub struct HistoryQuery {
    pub user_id: Option<i64>,
    #[validate(range(min = 1, message = "page starts at 1"))]
    pub page: Option<u32>,
}

#[derive(Deserialize, Debug, Validate)]
pub struct AcceptQuery {
    #[serde(alias = "jobid")]
    #[validate(range(min = 1, message = "job_id must be a positive id"))]
    pub job_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_feed_treats_empty_strings_as_absent() {
        let req: DistanceFeedRequest = serde_json::from_value(serde_json::json!({
            "jobid": 4,
            "distance": "",
            "time": "35",
            "session_time": "",
            "flagged": "true",
            "admincomment": "customer was late"
        }))
        .unwrap();

        assert_eq!(req.job_id, 4);
        assert_eq!(req.distance, None);
        assert_eq!(req.time, Some(35.0));
        assert_eq!(req.session_time, None);
        assert_eq!(req.flagged, Some(true));
        assert_eq!(req.admin_comment.as_deref(), Some("customer was late"));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn distance_feed_rejects_garbage_numbers() {
        let res = serde_json::from_value::<DistanceFeedRequest>(serde_json::json!({
            "job_id": 4,
            "distance": "far"
        }));
        assert!(res.is_err());
    }

    #[test]
    fn distance_feed_rejects_non_finite_numbers() {
        for (distance, time) in [("NaN", "1"), ("1", "inf"), ("-infinity", "")] {
            let res = serde_json::from_value::<DistanceFeedRequest>(serde_json::json!({
                "jobid": 4,
                "distance": distance,
                "time": time
            }));
            assert!(res.is_err(), "{} / {} should be rejected", distance, time);
        }
    }

    #[test]
    fn create_request_validates_language_and_duration() {
        let req: CreateJobRequest = serde_json::from_value(serde_json::json!({
            "language": "x",
            "duration_minutes": 0
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert_eq!(fields.len(), 2);
    }
}
