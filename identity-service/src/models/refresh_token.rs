//! Refresh token model - long-lived session record bound to
//! tenant/client/user/device context.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

/// Stored refresh token. The opaque token value itself is never persisted;
/// only its SHA-256 hash is.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub tenant_id: String,
    pub client_id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub scope: String,
    pub device_name: String,
    pub ip: String,
    pub source: String,
    pub location: String,
    /// Ordered list of authentication methods used to obtain this token.
    pub auth_methods: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Request-time context captured alongside a newly issued refresh token.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub device_name: String,
    pub ip: String,
    pub source: String,
    pub location: String,
}

impl RefreshToken {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: String,
        client_id: String,
        user_id: String,
        token: &str,
        expires_in_seconds: i64,
        scope: String,
        auth_methods: Vec<String>,
        context: SessionContext,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            tenant_id,
            client_id,
            user_id,
            token_hash: Self::hash_token(token),
            expires_at: now + Duration::seconds(expires_in_seconds),
            active: true,
            scope,
            device_name: context.device_name,
            ip: context.ip,
            source: context.source,
            location: context.location,
            auth_methods,
            created_at: now,
        }
    }

    /// Hash a token using SHA-256. The hash is also the token's `rft_id`.
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Validity requires `active` and an expiry in the future; tenant and
    /// client scoping is enforced at lookup time.
    pub fn is_valid(&self) -> bool {
        self.active && !self.is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_token() -> RefreshToken {
        RefreshToken::new(
            "tenant-a".to_string(),
            "client-1".to_string(),
            "user-1".to_string(),
            "opaque-token",
            3600,
            "openid profile".to_string(),
            vec!["pwd".to_string()],
            SessionContext::default(),
        )
    }

    #[test]
    fn new_token_is_valid_and_hashed() {
        let token = sample_token();
        assert!(token.is_valid());
        assert_ne!(token.token_hash, "opaque-token");
        assert_eq!(token.token_hash, RefreshToken::hash_token("opaque-token"));
    }

    #[test]
    fn expired_token_is_invalid() {
        let mut token = sample_token();
        token.expires_at = Utc::now() - Duration::seconds(1);
        assert!(token.is_expired());
        assert!(!token.is_valid());
    }

    #[test]
    fn deactivated_token_is_invalid() {
        let mut token = sample_token();
        token.active = false;
        assert!(!token.is_valid());
    }
}
