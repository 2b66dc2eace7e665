pub mod dispatcher;
pub mod transport;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

pub use dispatcher::NotificationDispatcher;
pub use transport::{LogTransport, NotificationTransport};

/// Why a job event is being announced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    JobOffered,
    JobAccepted,
    JobCancelled,
    JobWithdrawn,
    JobStarted,
    JobCompleted,
    CustomerNoShow,
    JobReopened,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPayload {
    pub kind: NotificationKind,
    pub job_id: i64,
    pub message: String,
}

/// Target of a notification. `*` selects every translator eligible for the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Broadcast,
    User(i64),
}

impl FromStr for Recipient {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "*" => Ok(Recipient::Broadcast),
            other => other
                .parse()
                .map(Recipient::User)
                .map_err(|_| format!("invalid recipient selector: {}", other)),
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Broadcast => f.write_str("*"),
            Recipient::User(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Push,
    Sms,
}

/// A single dispatch action. Built per send, never stored.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub job_id: i64,
    pub recipient: Recipient,
    pub channel: Channel,
    pub payload: NotificationPayload,
}

/// Transport-level failure. Always folded into a `DeliveryStatus`.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery failed: {0}")]
    Failed(String),

    #[error("delivery timed out after {0} ms")]
    TimedOut(u128),

    #[error("user {0} has no phone number")]
    NoPhone(i64),

    #[error("recipient lookup failed: {0}")]
    Lookup(String),
}

/// Outcome of a notification send, reported alongside the triggering result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryStatus {
    pub success: bool,
    pub channel: Channel,
    pub recipient: String,
    pub delivered: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DeliveryStatus {
    pub fn sent(channel: Channel, recipient: Recipient, delivered: usize) -> Self {
        Self {
            success: true,
            channel,
            recipient: recipient.to_string(),
            delivered,
            reason: None,
        }
    }

    pub fn failed(channel: Channel, recipient: Recipient, error: &DeliveryError) -> Self {
        Self {
            success: false,
            channel,
            recipient: recipient.to_string(),
            delivered: 0,
            reason: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_selector_parsing() {
        assert_eq!("*".parse::<Recipient>(), Ok(Recipient::Broadcast));
        assert_eq!(" 17 ".parse::<Recipient>(), Ok(Recipient::User(17)));
        assert!("everyone".parse::<Recipient>().is_err());
    }
}
