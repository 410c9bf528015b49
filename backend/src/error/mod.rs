use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Error taxonomy of the session lifecycle protocol.
///
/// Infrastructure failures (`Persistence`, `Configuration`) are never
/// downgraded to denials so operators can tell an outage from an attack.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("credential already expired")]
    ExpiredCredential,

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("persistence failure: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AuthError::Configuration(ref msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Service misconfigured".to_string(),
                    "CONFIGURATION_ERROR".to_string(),
                )
            }
            AuthError::InvalidCredential(msg) => (
                StatusCode::UNAUTHORIZED,
                msg,
                "INVALID_CREDENTIAL".to_string(),
            ),
            AuthError::ExpiredCredential => (
                StatusCode::UNAUTHORIZED,
                "Credential already expired".to_string(),
                "EXPIRED_CREDENTIAL".to_string(),
            ),
            AuthError::Authentication(msg) => (
                StatusCode::UNAUTHORIZED,
                msg,
                "AUTHENTICATION_ERROR".to_string(),
            ),
            AuthError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND".to_string()),
            AuthError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                msg,
                "VALIDATION_ERROR".to_string(),
            ),
            AuthError::Persistence(err) => {
                tracing::error!("Persistence failure: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Persistence failure".to_string(),
                    "PERSISTENCE_ERROR".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code,
        });

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AuthError::NotFound("No active session found".to_string()),
            _ => AuthError::Persistence(err.into()),
        }
    }
}

impl From<bb8_redis::redis::RedisError> for AuthError {
    fn from(err: bb8_redis::redis::RedisError) -> Self {
        AuthError::Persistence(err.into())
    }
}

impl From<bb8::RunError<bb8_redis::redis::RedisError>> for AuthError {
    fn from(err: bb8::RunError<bb8_redis::redis::RedisError>) -> Self {
        AuthError::Persistence(anyhow::anyhow!("redis pool error: {}", err))
    }
}
