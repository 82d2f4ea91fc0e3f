use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use infantry_db::StoreError;
use infantry_types::api::ErrorResponse;

/// Single failure outcome of an engine operation. Nothing is persisted when
/// one of these is returned.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("{0} must be a non-empty string")]
    EmptyField(&'static str),
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid username or password")]
    Unauthorized,
    #[error("credential is inactive")]
    Inactive,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("background task failed: {0}")]
    Task(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => EngineError::Conflict(msg),
            other => EngineError::Store(other),
        }
    }
}

impl From<JsonRejection> for EngineError {
    fn from(rejection: JsonRejection) -> Self {
        EngineError::InvalidField {
            field: "body",
            reason: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for EngineError {
    fn from(rejection: PathRejection) -> Self {
        EngineError::InvalidField {
            field: "path",
            reason: rejection.body_text(),
        }
    }
}

impl EngineError {
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::MissingField(_)
            | EngineError::EmptyField(_)
            | EngineError::InvalidField { .. } => StatusCode::BAD_REQUEST,
            EngineError::Unauthorized => StatusCode::UNAUTHORIZED,
            EngineError::Inactive => StatusCode::FORBIDDEN,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Hashing(_) | EngineError::Task(_) | EngineError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_become_engine_conflicts() {
        let err: EngineError = StoreError::Conflict("UNIQUE constraint failed".into()).into();
        assert!(matches!(err, EngineError::Conflict(_)));
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: EngineError = StoreError::Corrupt("bad json".into()).into();
        assert!(matches!(err, EngineError::Store(StoreError::Corrupt(_))));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_errors_are_client_errors() {
        assert_eq!(EngineError::MissingField("email").status(), StatusCode::BAD_REQUEST);
        assert_eq!(EngineError::EmptyField("username").status(), StatusCode::BAD_REQUEST);
        assert_eq!(EngineError::NotFound("user").status(), StatusCode::NOT_FOUND);
        assert_eq!(EngineError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(EngineError::Inactive.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn internal_failures_hide_details() {
        for err in [
            EngineError::Hashing("bad params".into()),
            EngineError::Task("panicked".into()),
        ] {
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
