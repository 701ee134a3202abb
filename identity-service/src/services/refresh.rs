//! Refresh token validation, rotation of access tokens, and session listing.

use std::sync::Arc;

use crate::dtos::{RefreshTokenItem, RefreshTokenListResponse};
use crate::models::RefreshToken;
use crate::services::error::ServiceError;
use crate::services::issuer::{AccessClaims, IssuedAccess, TokenIssuer};
use crate::services::store::RefreshTokenStore;

const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_PAGE_SIZE: i64 = 20;

pub struct RefreshTokenManager {
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    issuer: Arc<TokenIssuer>,
}

impl RefreshTokenManager {
    pub fn new(refresh_tokens: Arc<dyn RefreshTokenStore>, issuer: Arc<TokenIssuer>) -> Self {
        Self {
            refresh_tokens,
            issuer,
        }
    }

    /// Exchange a valid refresh token for a fresh access token bound to the
    /// same `rft_id`. `client_id` is optional; when present it must match
    /// the token's owning client.
    pub async fn refresh(
        &self,
        tenant_id: &str,
        refresh_token: &str,
        client_id: Option<&str>,
    ) -> Result<IssuedAccess, ServiceError> {
        let token_hash = RefreshToken::hash_token(refresh_token);
        let token = self
            .refresh_tokens
            .find_by_hash(tenant_id, &token_hash)
            .await?
            .filter(|t| t.is_valid())
            .ok_or_else(|| ServiceError::Unauthorized("Invalid refresh token".to_string()))?;

        if let Some(client_id) = client_id {
            if token.client_id != client_id {
                return Err(ServiceError::Unauthorized(
                    "Invalid refresh token".to_string(),
                ));
            }
        }

        self.issuer
            .issue_access(
                tenant_id,
                &token.client_id,
                &token.user_id,
                &token.scope,
                &token.auth_methods,
                &token.token_hash,
            )
            .await
    }

    /// Deactivate the token. Revocation of an unknown token is not an error.
    pub async fn revoke(&self, tenant_id: &str, refresh_token: &str) -> Result<(), ServiceError> {
        let token_hash = RefreshToken::hash_token(refresh_token);
        self.refresh_tokens
            .deactivate(tenant_id, &token_hash)
            .await?;
        Ok(())
    }

    /// List the caller's active sessions for one client, 1-based pagination.
    /// `total_count` is the full matching count regardless of the page.
    pub async fn list(
        &self,
        tenant_id: &str,
        claims: &AccessClaims,
        client_id: Option<&str>,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<RefreshTokenListResponse, ServiceError> {
        let client_id = client_id
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ServiceError::InvalidRequest("client_id is required".to_string()))?;

        let page = page.unwrap_or(1);
        if page < 1 {
            return Err(ServiceError::InvalidRequest(
                "page value cannot be less than 1".to_string(),
            ));
        }

        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ServiceError::InvalidRequest(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        // Callers may ask for any page >= 1; pages past the end are empty,
        // never an arithmetic fault.
        let offset = page.saturating_sub(1).saturating_mul(page_size);
        let tokens = self
            .refresh_tokens
            .list_active(tenant_id, &claims.sub, client_id, page_size, offset)
            .await?;
        let total_count = self
            .refresh_tokens
            .count_active(tenant_id, &claims.sub, client_id)
            .await?;

        Ok(RefreshTokenListResponse {
            refresh_tokens: tokens.into_iter().map(RefreshTokenItem::from).collect(),
            total_count,
        })
    }
}
