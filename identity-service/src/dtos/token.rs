use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::RefreshToken;

/// Full token bundle returned by biometric completion.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenBundleResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
    #[schema(example = "bearer")]
    pub token_type: String,
    #[schema(example = 900)]
    pub expires_in: i64,
    /// Tenant-configured multi-factor list for the client, passed through.
    pub mfa_factors: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub refresh_token: String,
    /// Optional; when present it must match the token's owning client.
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    #[schema(example = "bearer")]
    pub token_type: String,
    #[schema(example = 900)]
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListRefreshTokensQuery {
    pub client_id: Option<String>,
    /// 1-based page number.
    pub page: Option<i64>,
    /// Items per page, 1 to 100.
    pub page_size: Option<i64>,
}

/// One active session in the refresh-token listing. The `refresh_token`
/// field carries the token's stable id (its hash), never the opaque value.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshTokenItem {
    pub refresh_token: String,
    pub device_name: String,
    pub ip: String,
    pub source: String,
    pub location: String,
    pub scope: String,
    pub auth_methods: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<RefreshToken> for RefreshTokenItem {
    fn from(token: RefreshToken) -> Self {
        Self {
            refresh_token: token.token_hash,
            device_name: token.device_name,
            ip: token.ip,
            source: token.source,
            location: token.location,
            scope: token.scope,
            auth_methods: token.auth_methods,
            created_at: token.created_at,
            expires_at: token.expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshTokenListResponse {
    pub refresh_tokens: Vec<RefreshTokenItem>,
    #[schema(example = 5)]
    pub total_count: i64,
}
