use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;
use tracing::{error, warn};

use crate::api::validation::ErrorResponse;
use crate::db::models::JobStatus;
use crate::db::StoreError;

/// Service-level errors
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Unknown job or user id
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Caller identity missing from the request
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Caller's role does not allow the operation
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed or contradictory input
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The job's state machine does not allow the move
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// Another translator accepted the job first
    #[error("job {0} has already been taken")]
    AlreadyTaken(i64),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ServiceError::NotFound { entity: "job", id },
            StoreError::UserNotFound(id) => ServiceError::NotFound { entity: "user", id },
            StoreError::Validation(msg) => ServiceError::ValidationFailed(msg),
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    /// Maps a failed conditional transition towards `to` onto the state-machine error
    pub fn from_transition(err: StoreError, to: JobStatus) -> Self {
        match err {
            StoreError::Conflict { current, .. } => {
                ServiceError::InvalidTransition { from: current, to }
            }
            other => other.into(),
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ServiceError::InvalidTransition { .. } | ServiceError::AlreadyTaken(_) => {
                StatusCode::CONFLICT
            }
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            ServiceError::NotFound { .. } => "Not found",
            ServiceError::Unauthenticated(_) => "Unauthenticated",
            ServiceError::Forbidden(_) => "Forbidden",
            ServiceError::ValidationFailed(_) => "Validation failed",
            ServiceError::InvalidTransition { .. } => "Invalid transition",
            ServiceError::AlreadyTaken(_) => "Already taken",
            ServiceError::Store(e) => {
                error!("Store error: {}", e);
                return HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": "Database error occurred"}),
                });
            }
        };

        warn!("{}", self);
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: error.to_string(),
            fields: serde_json::json!({"message": self.to_string()}),
        })
    }
}
