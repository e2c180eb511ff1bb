use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::users::repo::{StoreError, UniqueField};

/// Error body returned to clients.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Username already exists: {0}")]
    DuplicateUsername(String),
    #[error("Email already exists: {0}")]
    DuplicateEmail(String),
    #[error("User not found with id: {0}")]
    UserNotFound(i64),
    #[error("User not found: {0}")]
    UsernameNotFound(String),
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("User account is inactive")]
    AccountInactive,
    #[error("Invalid role: {0}")]
    InvalidRole(String),
    #[error("Invalid status: {0}")]
    InvalidStatus(String),
    #[error("{0}")]
    Validation(String),
    #[error("Unauthorized")]
    Unauthenticated,
    #[error("Forbidden")]
    Forbidden,
    #[error("store error: {0}")]
    Store(StoreError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Maps a store failure, naming the conflicting value for duplicates.
    pub fn from_store(err: StoreError, username: &str, email: &str) -> Self {
        match err {
            StoreError::Duplicate(UniqueField::Username) => {
                ApiError::DuplicateUsername(username.to_string())
            }
            StoreError::Duplicate(UniqueField::Email) => ApiError::DuplicateEmail(email.to_string()),
            StoreError::NotFound(id) => ApiError::UserNotFound(id),
            other => ApiError::Store(other),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::DuplicateUsername(_) | ApiError::DuplicateEmail(_) => StatusCode::CONFLICT,
            ApiError::UserNotFound(_) | ApiError::UsernameNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidCredentials | ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::AccountInactive | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::InvalidRole(_) | ApiError::InvalidStatus(_) | ApiError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client; internal failures never expose their
    /// cause.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Unauthenticated => "Unauthorized".into(),
            ApiError::Store(_) | ApiError::Internal(_) => "Internal server error".into(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::UserNotFound(id),
            other => ApiError::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_is_401_with_fixed_message() {
        let err = ApiError::Unauthenticated;
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.public_message(), "Unauthorized");
    }

    #[test]
    fn store_duplicates_map_to_named_conflicts() {
        let err = ApiError::from_store(
            StoreError::Duplicate(UniqueField::Email),
            "alice",
            "a@x.com",
        );
        assert!(matches!(&err, ApiError::DuplicateEmail(e) if e == "a@x.com"));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn internal_errors_hide_cause() {
        let err = ApiError::Internal(anyhow::anyhow!("connection refused at 10.0.0.1"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");
    }
}
