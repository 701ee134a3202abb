//! Per-tenant token config cache.
//!
//! Configs are owned by the admin service and change rarely; we cache them
//! for the lifetime of the process and rely on the admin service calling the
//! invalidation endpoint after every change. Instances do not see each
//! other's invalidations, so the invalidation call must be broadcast to all
//! of them.

use dashmap::DashMap;
use std::sync::Arc;

use crate::models::TokenConfig;
use crate::services::error::ServiceError;
use crate::services::store::ConfigStore;

pub struct TokenConfigProvider {
    store: Arc<dyn ConfigStore>,
    cache: DashMap<String, Arc<TokenConfig>>,
}

impl TokenConfigProvider {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// Resolve the tenant's config, reading through the cache. A tenant
    /// without a config cannot mint tokens; that is a deployment error, not
    /// a caller error.
    pub async fn get(&self, tenant_id: &str) -> Result<Arc<TokenConfig>, ServiceError> {
        if let Some(cached) = self.cache.get(tenant_id) {
            return Ok(cached.clone());
        }

        let config = self
            .store
            .find_token_config(tenant_id)
            .await?
            .ok_or_else(|| {
                ServiceError::TokenConfig(format!("No token config for tenant {}", tenant_id))
            })?;

        let config = Arc::new(config);
        self.cache
            .insert(tenant_id.to_string(), config.clone());
        Ok(config)
    }

    /// Drops the cached entry; the next `get` re-reads from the store.
    pub fn invalidate(&self, tenant_id: &str) {
        if self.cache.remove(tenant_id).is_some() {
            tracing::info!(tenant_id = %tenant_id, "Token config cache invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CookiePolicy, SameSitePolicy, SigningKey, TokenAlgorithm};
    use crate::services::store::InMemoryStore;

    fn sample_config(issuer: &str) -> TokenConfig {
        TokenConfig {
            algorithm: TokenAlgorithm::RS256,
            issuer: issuer.to_string(),
            cookie: CookiePolicy {
                domain: "example.com".to_string(),
                path: "/".to_string(),
                same_site: SameSitePolicy::Lax,
                secure: true,
                http_only: true,
            },
            access_token_ttl_seconds: 900,
            refresh_token_ttl_seconds: 86400,
            id_token_ttl_seconds: 900,
            access_claim_paths: Vec::new(),
            id_claim_paths: Vec::new(),
            keys: vec![SigningKey {
                kid: "k1".to_string(),
                private_key_pem: String::new(),
                public_key_pem: String::new(),
                current: true,
            }],
        }
    }

    #[tokio::test]
    async fn get_caches_until_invalidated() {
        let store = Arc::new(InMemoryStore::new());
        store
            .token_configs
            .lock()
            .unwrap()
            .insert("tenant-a".to_string(), sample_config("issuer-v1"));

        let provider = TokenConfigProvider::new(store.clone());
        assert_eq!(provider.get("tenant-a").await.unwrap().issuer, "issuer-v1");

        // Change behind the cache; stale value is served until invalidation.
        store
            .token_configs
            .lock()
            .unwrap()
            .insert("tenant-a".to_string(), sample_config("issuer-v2"));
        assert_eq!(provider.get("tenant-a").await.unwrap().issuer, "issuer-v1");

        provider.invalidate("tenant-a");
        assert_eq!(provider.get("tenant-a").await.unwrap().issuer, "issuer-v2");
    }

    #[tokio::test]
    async fn missing_config_is_an_error() {
        let provider = TokenConfigProvider::new(Arc::new(InMemoryStore::new()));
        assert!(matches!(
            provider.get("unknown").await,
            Err(ServiceError::TokenConfig(_))
        ));
    }
}
