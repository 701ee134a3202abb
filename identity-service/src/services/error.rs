use service_core::error::AppError;
use thiserror::Error;

/// Domain errors for the authentication core. Each variant maps onto a
/// stable machine-readable code in the HTTP error payload.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Access token rejected; the description is surfaced via the
    /// `WWW-Authenticate` header so callers can tell expired from malformed
    /// from client-mismatched tokens.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// State absent, expired or already consumed. Deliberately a single code
    /// for all three so states cannot be enumerated.
    #[error("Challenge not found")]
    ChallengeNotFound,

    #[error("Refresh token does not match the challenge state")]
    RefreshTokenMismatch,

    #[error("Client id does not match the challenge state")]
    ClientIdMismatch,

    #[error("Signature verification failed")]
    InvalidSignature,

    #[error("Signature is not valid base64")]
    InvalidEncoding,

    #[error("Public key must be a PEM-encoded P-256 EC key")]
    InvalidPublicKeyFormat,

    #[error("Credential not found")]
    CredentialNotFound,

    /// Signing key missing or unusable. Should never happen while the
    /// one-current-key invariant holds.
    #[error("Token config error: {0}")]
    TokenConfig(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Redis(e) => AppError::RedisError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidRequest(msg) => AppError::invalid_request("invalid_request", msg),
            ServiceError::Unauthorized(msg) => AppError::unauthorized("unauthorized", msg),
            ServiceError::InvalidToken(description) => AppError::InvalidToken { description },
            ServiceError::ChallengeNotFound => AppError::invalid_request(
                "challenge_not_found",
                "Challenge not found or already consumed",
            ),
            ServiceError::RefreshTokenMismatch => AppError::invalid_request(
                "state_invalid_refresh_token_mismatch",
                "Refresh token does not match the challenge state",
            ),
            ServiceError::ClientIdMismatch => AppError::invalid_request(
                "state_invalid_client_id_mismatch",
                "Client id does not match the challenge state",
            ),
            ServiceError::InvalidSignature => {
                AppError::unauthorized("invalid_signature", "Signature verification failed")
            }
            ServiceError::InvalidEncoding => {
                AppError::invalid_request("invalid_encoding", "Signature is not valid base64")
            }
            ServiceError::InvalidPublicKeyFormat => AppError::invalid_request(
                "invalid_public_key_format",
                "Public key must be a PEM-encoded P-256 EC key",
            ),
            ServiceError::CredentialNotFound => {
                AppError::not_found("credential_not_found", "Credential not found")
            }
            ServiceError::TokenConfig(msg) => AppError::ConfigError(anyhow::anyhow!(msg)),
        }
    }
}
