use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::session_machine::PlanError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// No session, quiz, or join code matches the request.
    #[error("not found: {0}")]
    NotFound(String),
    /// The caller does not own the session.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The session has no run in progress; players should wait in the lobby.
    #[error("session `{0}` is not live")]
    NotLive(String),
    /// `Start` on a session that is already live.
    #[error("session `{0}` is already live")]
    AlreadyLive(String),
    /// No free join code was found within the probing budget.
    #[error("no free join code after {attempts} attempt(s)")]
    AllocationExhausted {
        /// Reservations attempted before giving up.
        attempts: u32,
    },
    /// The session changed under the caller; refetch and retry.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ServiceError {
    /// Map a planning failure for `session_id` onto the service taxonomy.
    pub fn from_plan(session_id: &str, err: PlanError) -> Self {
        match err {
            PlanError::AlreadyLive => ServiceError::AlreadyLive(session_id.to_owned()),
            PlanError::NotLive | PlanError::Unchanged => {
                ServiceError::NotLive(session_id.to_owned())
            }
            PlanError::EmptyQuiz => {
                ServiceError::InvalidInput(format!("quiz `{session_id}` has no questions"))
            }
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or malformed caller identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Caller identity does not own the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Expected lobby signal: the session is not running.
    #[error("{0}")]
    NotLive(String),
    /// The session is already running.
    #[error("{0}")]
    AlreadyLive(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Join-code space exhausted.
    #[error("{0}")]
    AllocationExhausted(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Machine-readable code clients branch on.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::NotLive(_) => "not_live",
            AppError::AlreadyLive(_) => "already_live",
            AppError::Conflict(_) => "conflict",
            AppError::AllocationExhausted(_) => "allocation_exhausted",
            AppError::ServiceUnavailable(_) => "unavailable",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotLive(_) | AppError::AlreadyLive(_) | AppError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            AppError::AllocationExhausted(_) | AppError::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => {
                warn!(error = %source, "storage failure while serving request");
                AppError::ServiceUnavailable(source.to_string())
            }
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            err @ ServiceError::NotLive(_) => AppError::NotLive(err.to_string()),
            err @ ServiceError::AlreadyLive(_) => AppError::AlreadyLive(err.to_string()),
            err @ ServiceError::AllocationExhausted { .. } => {
                AppError::AllocationExhausted(err.to_string())
            }
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorBody {
            code: self.code(),
            message: self.to_string(),
        });

        (self.status(), payload).into_response()
    }
}
