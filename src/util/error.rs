use axum::{response::{IntoResponse, Response}, http::StatusCode};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
pub enum HandlerErrorKind {
    NotFound,
    Validation,
    Internal,
    Conflict,
    BadRequest,
    PartialFailure,
}

impl std::fmt::Display for HandlerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HandlerErrorKind::NotFound => "NotFound",
            HandlerErrorKind::Validation => "Validation",
            HandlerErrorKind::Internal => "Internal",
            HandlerErrorKind::Conflict => "Conflict",
            HandlerErrorKind::BadRequest => "BadRequest",
            HandlerErrorKind::PartialFailure => "PartialFailure",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Serialize)]
pub struct HandlerError {
    pub error: HandlerErrorKind,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerError {
    pub fn bad_request<T: Into<String>>(msg: T) -> Self {
        HandlerError {
            error: HandlerErrorKind::BadRequest,
            message: msg.into(),
            details: None,
        }
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for HandlerError {}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = match self.error {
            HandlerErrorKind::NotFound => StatusCode::NOT_FOUND,
            HandlerErrorKind::Validation | HandlerErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            HandlerErrorKind::Conflict => StatusCode::CONFLICT,
            HandlerErrorKind::PartialFailure | HandlerErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = axum::Json(self);
        (status, body).into_response()
    }
}

impl From<ServiceError> for HandlerError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::NotFound(_) => HandlerError {
                error: HandlerErrorKind::NotFound,
                message,
                details: None,
            },
            ServiceError::ValidationFailure(_) => HandlerError {
                error: HandlerErrorKind::Validation,
                message,
                details: None,
            },
            ServiceError::InvalidStateTransition { entity, id, current, attempted } => HandlerError {
                error: HandlerErrorKind::Conflict,
                message,
                details: Some(json!({
                    "entity": entity,
                    "id": id,
                    "currentState": current,
                    "attempted": attempted,
                })),
            },
            ServiceError::PartialBatchFailure { completed, total, .. } => HandlerError {
                error: HandlerErrorKind::PartialFailure,
                message,
                details: Some(json!({ "completed": completed, "total": total })),
            },
            ServiceError::AllocationConflict(_) | ServiceError::Conflict(_) => HandlerError {
                error: HandlerErrorKind::Conflict,
                message,
                details: None,
            },
            ServiceError::InternalError(_) => HandlerError {
                error: HandlerErrorKind::Internal,
                message,
                details: None,
            },
        }
    }
}


#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Cannot {attempted} {entity} {id}: current state is '{current}'")]
    InvalidStateTransition {
        entity: String,
        id: String,
        current: String,
        attempted: String,
    },

    #[error("Validation Failure: {0}")]
    ValidationFailure(String),

    #[error("Partial Batch Failure: {completed} of {total} applied: {message}")]
    PartialBatchFailure {
        completed: usize,
        total: usize,
        message: String,
    },

    #[error("Allocation Conflict: {0}")]
    AllocationConflict(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal Error: {0}")]
    InternalError(String),
}

impl ServiceError {
    pub fn invalid_transition(
        entity: &str,
        id: &str,
        current: impl std::fmt::Display,
        attempted: &str,
    ) -> Self {
        ServiceError::InvalidStateTransition {
            entity: entity.to_string(),
            id: id.to_string(),
            current: current.to_string(),
            attempted: attempted.to_string(),
        }
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        ServiceError::ValidationFailure(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        ServiceError::NotFound(msg.into())
    }
}

// Allow conversion from RepositoryError to ServiceError
impl From<crate::repository::repository_error::RepositoryError> for ServiceError {
    fn from(err: crate::repository::repository_error::RepositoryError) -> Self {
        use crate::repository::repository_error::RepositoryError;
        match err {
            RepositoryError::NotFound(msg) => ServiceError::NotFound(msg),
            RepositoryError::ValidationError(msg) => ServiceError::ValidationFailure(msg),
            RepositoryError::AlreadyExists(msg) => ServiceError::Conflict(msg),
            RepositoryError::Conflict(msg) => ServiceError::Conflict(msg),
            RepositoryError::DatabaseError(msg) => ServiceError::InternalError(msg),
            RepositoryError::ConnectionError(msg) => ServiceError::InternalError(msg),
            RepositoryError::SerializationError(msg) => ServiceError::InternalError(msg),
            RepositoryError::Generic(e) => ServiceError::InternalError(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationFailure(err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::repository_error::RepositoryError;

    #[test]
    fn test_invalid_transition_carries_current_state() {
        let err = ServiceError::invalid_transition("client request", "inq-1_a@b.com", "approved", "approve");
        assert_eq!(
            err.to_string(),
            "Cannot approve client request inq-1_a@b.com: current state is 'approved'"
        );
        let handler: HandlerError = err.into();
        let details = handler.details.expect("details");
        assert_eq!(details["currentState"], "approved");
    }

    #[test]
    fn test_repository_errors_map_to_service_errors() {
        let err: ServiceError = RepositoryError::not_found("thread").into();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let err: ServiceError = RepositoryError::conflict("revision").into();
        assert!(matches!(err, ServiceError::Conflict(_)));
        let err: ServiceError = RepositoryError::database("boom").into();
        assert!(matches!(err, ServiceError::InternalError(_)));
    }

    #[test]
    fn test_partial_batch_failure_reports_progress() {
        let err = ServiceError::PartialBatchFailure {
            completed: 500,
            total: 1200,
            message: "connection reset".to_string(),
        };
        let handler: HandlerError = err.into();
        assert_eq!(handler.details.expect("details")["completed"], 500);
    }
}
