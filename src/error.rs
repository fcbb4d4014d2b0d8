//! Error Types
//!
//! One closed set of failures for the whole service. The HTTP status for each
//! variant comes from [`AuthError::status_code`], so the core never deals with
//! transport details.

use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// Message shared by every authentication failure at the HTTP boundary
pub const UNAUTHORIZED_MESSAGE: &str = "Could not validate credentials";

/// Service errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Email or username already registered")]
    DuplicateUser,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    /// A structurally valid token whose user is gone or deactivated
    #[error("User not found")]
    UserNotFound,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not allowed to modify this user")]
    Forbidden,

    #[error("Resource not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error")]
    Internal,
}

impl AuthError {
    /// True for every failure of the authentication path
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::InvalidToken
                | AuthError::ExpiredToken
                | AuthError::UserNotFound
        )
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::DuplicateUser => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Configuration(_) | AuthError::Database(_) | AuthError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AuthError::DuplicateUser => "duplicate_user",
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::UserNotFound => "unauthorized",
            AuthError::Validation(_) => "validation_error",
            AuthError::Forbidden => "forbidden",
            AuthError::NotFound => "not_found",
            AuthError::Configuration(_) | AuthError::Database(_) | AuthError::Internal => {
                "internal_error"
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            e if e.is_unauthorized() => UNAUTHORIZED_MESSAGE.to_string(),
            AuthError::Validation(msg) => msg.clone(),
            AuthError::Configuration(_) | AuthError::Database(_) | AuthError::Internal => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.is_unauthorized() {
            tracing::debug!(reason = %self, "Request unauthorized");
        }

        let body = Json(serde_json::json!({
            "error": self.error_code(),
            "message": self.public_message()
        }));

        if self.is_unauthorized() {
            return (
                self.status_code(),
                [(header::WWW_AUTHENTICATE, "Bearer")],
                body,
            )
                .into_response();
        }

        (self.status_code(), body).into_response()
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return AuthError::DuplicateUser;
            }
        }
        tracing::error!("Database error: {:?}", err);
        AuthError::Database(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!("Password hashing error: {:?}", err);
        AuthError::Internal
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::debug!("JWT error: {:?}", err);
        AuthError::InvalidToken
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthError::Validation(err.to_string())
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::Validation(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!("Blocking task failed: {:?}", err);
        AuthError::Internal
    }
}
