use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-level error mapped to an HTTP response.
///
/// Every variant carries a stable machine-readable code surfaced in the
/// response body as `{"error": code, "error_description": message}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{code}: {message}")]
    InvalidRequest { code: String, message: String },

    #[error("{code}: {message}")]
    Unauthorized { code: String, message: String },

    /// Bearer token rejection; also rendered as a `WWW-Authenticate`
    /// challenge so clients can distinguish failure causes.
    #[error("invalid_token: {description}")]
    InvalidToken { description: String },

    #[error("{code}: {message}")]
    NotFound { code: String, message: String },

    #[error("{code}: {message}")]
    Conflict { code: String, message: String },

    #[error("Too many requests: {0}")]
    TooManyRequests(String, Option<u64>),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    pub fn invalid_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::InvalidRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Conflict {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::InvalidToken {
            description: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            error_description: Option<String>,
        }

        let mut www_authenticate = None;
        let mut retry_after = None;

        let (status, code, description) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_request".to_string(),
                Some(err.to_string()),
            ),
            AppError::InvalidRequest { code, message } => {
                (StatusCode::BAD_REQUEST, code, Some(message))
            }
            AppError::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, code, Some(message))
            }
            AppError::InvalidToken { description } => {
                www_authenticate = Some(format!(
                    "Bearer error=\"invalid_token\", error_description=\"{}\"",
                    description.replace('"', "'")
                ));
                (
                    StatusCode::UNAUTHORIZED,
                    "invalid_token".to_string(),
                    Some(description),
                )
            }
            AppError::NotFound { code, message } => (StatusCode::NOT_FOUND, code, Some(message)),
            AppError::Conflict { code, message } => (StatusCode::CONFLICT, code, Some(message)),
            AppError::TooManyRequests(msg, retry) => {
                retry_after = retry;
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "too_many_requests".to_string(),
                    Some(msg),
                )
            }
            AppError::InternalError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error".to_string(),
                Some(err.to_string()),
            ),
            AppError::DatabaseError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error".to_string(),
                Some(err.to_string()),
            ),
            AppError::RedisError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error".to_string(),
                Some(err.to_string()),
            ),
            AppError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error".to_string(),
                Some(err.to_string()),
            ),
        };

        let mut res = (
            status,
            Json(ErrorResponse {
                error: code,
                error_description: description,
            }),
        )
            .into_response();

        if let Some(challenge) = www_authenticate {
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                res.headers_mut().insert(header::WWW_AUTHENTICATE, value);
            }
        }

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(header::RETRY_AFTER, retry.into());
        }

        res
    }
}
