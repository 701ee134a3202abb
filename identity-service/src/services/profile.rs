//! External user profile fetcher.
//!
//! Profiles live in an external identity store and feed the dynamic claim
//! extraction in the token issuer. Fetching is best-effort: the issuer
//! degrades by omitting extracted claims when a profile cannot be resolved.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use service_core::observability::trace_context::inject_trace_context;

use crate::services::error::ServiceError;

#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    /// Resolve a user's profile document. `Ok(None)` means the store has no
    /// profile for this user; errors mean the store could not be reached.
    async fn fetch(&self, tenant_id: &str, user_id: &str)
        -> Result<Option<Value>, ServiceError>;
}

pub struct HttpProfileFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProfileFetcher {
    pub fn new(base_url: String, timeout_seconds: u64) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ServiceError::Internal(anyhow::Error::new(e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ProfileFetcher for HttpProfileFetcher {
    async fn fetch(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Option<Value>, ServiceError> {
        let url = format!(
            "{}/tenants/{}/users/{}/profile",
            self.base_url, tenant_id, user_id
        );

        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(anyhow::Error::new(e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|e| ServiceError::Internal(anyhow::Error::new(e)))?;

        let profile = response
            .json::<Value>()
            .await
            .map_err(|e| ServiceError::Internal(anyhow::Error::new(e)))?;

        Ok(Some(profile))
    }
}

/// Fixed profiles for tests.
#[derive(Default)]
pub struct StaticProfiles {
    profiles: Mutex<HashMap<(String, String), Value>>,
}

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tenant_id: &str, user_id: &str, profile: Value) {
        self.profiles
            .lock()
            .unwrap()
            .insert((tenant_id.to_string(), user_id.to_string()), profile);
    }
}

#[async_trait]
impl ProfileFetcher for StaticProfiles {
    async fn fetch(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Option<Value>, ServiceError> {
        let profiles = self.profiles.lock().unwrap();
        Ok(profiles
            .get(&(tenant_id.to_string(), user_id.to_string()))
            .cloned())
    }
}
