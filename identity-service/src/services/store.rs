//! Storage traits for the durable entities, plus an in-memory implementation
//! used by tests and local development.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{BiometricCredential, Client, RefreshToken, TokenConfig};
use crate::services::error::ServiceError;

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn find_client(
        &self,
        tenant_id: &str,
        client_id: &str,
    ) -> Result<Option<Client>, ServiceError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_device(
        &self,
        tenant_id: &str,
        client_id: &str,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<BiometricCredential>, ServiceError>;

    async fn find_by_credential_id(
        &self,
        tenant_id: &str,
        client_id: &str,
        credential_id: &str,
    ) -> Result<Option<BiometricCredential>, ServiceError>;

    /// Insert or replace the credential for the device. Re-registration keeps
    /// the existing `credential_id` and swaps the public key. Returns the
    /// stored record.
    async fn upsert(
        &self,
        credential: BiometricCredential,
    ) -> Result<BiometricCredential, ServiceError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, token: &RefreshToken) -> Result<(), ServiceError>;

    async fn find_by_hash(
        &self,
        tenant_id: &str,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, ServiceError>;

    /// Active, unexpired tokens for (tenant, user, client), newest first.
    async fn list_active(
        &self,
        tenant_id: &str,
        user_id: &str,
        client_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RefreshToken>, ServiceError>;

    async fn count_active(
        &self,
        tenant_id: &str,
        user_id: &str,
        client_id: &str,
    ) -> Result<i64, ServiceError>;

    /// Marks the token inactive. Returns false when no row matched.
    async fn deactivate(&self, tenant_id: &str, token_hash: &str) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn find_token_config(
        &self,
        tenant_id: &str,
    ) -> Result<Option<TokenConfig>, ServiceError>;
}

/// Mutex-backed store for tests and local runs. Key layout mirrors the
/// database unique constraints.
#[derive(Default)]
pub struct InMemoryStore {
    pub clients: Mutex<HashMap<(String, String), Client>>,
    /// Keyed by (tenant, client, user, device).
    pub credentials: Mutex<HashMap<(String, String, String, String), BiometricCredential>>,
    /// Keyed by (tenant, token_hash).
    pub refresh_tokens: Mutex<HashMap<(String, String), RefreshToken>>,
    pub token_configs: Mutex<HashMap<String, TokenConfig>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for InMemoryStore {
    async fn find_client(
        &self,
        tenant_id: &str,
        client_id: &str,
    ) -> Result<Option<Client>, ServiceError> {
        let clients = self.clients.lock().unwrap();
        Ok(clients
            .get(&(tenant_id.to_string(), client_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_by_device(
        &self,
        tenant_id: &str,
        client_id: &str,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<BiometricCredential>, ServiceError> {
        let credentials = self.credentials.lock().unwrap();
        Ok(credentials
            .get(&(
                tenant_id.to_string(),
                client_id.to_string(),
                user_id.to_string(),
                device_id.to_string(),
            ))
            .cloned())
    }

    async fn find_by_credential_id(
        &self,
        tenant_id: &str,
        client_id: &str,
        credential_id: &str,
    ) -> Result<Option<BiometricCredential>, ServiceError> {
        let credentials = self.credentials.lock().unwrap();
        Ok(credentials
            .values()
            .find(|c| {
                c.tenant_id == tenant_id
                    && c.client_id == client_id
                    && c.credential_id == credential_id
            })
            .cloned())
    }

    async fn upsert(
        &self,
        mut credential: BiometricCredential,
    ) -> Result<BiometricCredential, ServiceError> {
        let key = (
            credential.tenant_id.clone(),
            credential.client_id.clone(),
            credential.user_id.clone(),
            credential.device_id.clone(),
        );
        let mut credentials = self.credentials.lock().unwrap();
        if let Some(existing) = credentials.get(&key) {
            credential.credential_id = existing.credential_id.clone();
            credential.created_at = existing.created_at;
            credential.updated_at = Utc::now();
        }
        credentials.insert(key, credential.clone());
        Ok(credential)
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryStore {
    async fn insert(&self, token: &RefreshToken) -> Result<(), ServiceError> {
        let mut tokens = self.refresh_tokens.lock().unwrap();
        tokens.insert(
            (token.tenant_id.clone(), token.token_hash.clone()),
            token.clone(),
        );
        Ok(())
    }

    async fn find_by_hash(
        &self,
        tenant_id: &str,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, ServiceError> {
        let tokens = self.refresh_tokens.lock().unwrap();
        Ok(tokens
            .get(&(tenant_id.to_string(), token_hash.to_string()))
            .cloned())
    }

    async fn list_active(
        &self,
        tenant_id: &str,
        user_id: &str,
        client_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RefreshToken>, ServiceError> {
        let tokens = self.refresh_tokens.lock().unwrap();
        let mut matching: Vec<RefreshToken> = tokens
            .values()
            .filter(|t| {
                t.tenant_id == tenant_id
                    && t.user_id == user_id
                    && t.client_id == client_id
                    && t.is_valid()
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_active(
        &self,
        tenant_id: &str,
        user_id: &str,
        client_id: &str,
    ) -> Result<i64, ServiceError> {
        let tokens = self.refresh_tokens.lock().unwrap();
        Ok(tokens
            .values()
            .filter(|t| {
                t.tenant_id == tenant_id
                    && t.user_id == user_id
                    && t.client_id == client_id
                    && t.is_valid()
            })
            .count() as i64)
    }

    async fn deactivate(&self, tenant_id: &str, token_hash: &str) -> Result<bool, ServiceError> {
        let mut tokens = self.refresh_tokens.lock().unwrap();
        match tokens.get_mut(&(tenant_id.to_string(), token_hash.to_string())) {
            Some(token) => {
                token.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ConfigStore for InMemoryStore {
    async fn find_token_config(
        &self,
        tenant_id: &str,
    ) -> Result<Option<TokenConfig>, ServiceError> {
        let configs = self.token_configs.lock().unwrap();
        Ok(configs.get(tenant_id).cloned())
    }
}
