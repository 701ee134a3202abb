//! Ephemeral challenge store with consume-once semantics.
//!
//! The `take` operation must be atomic across concurrent callers: only one
//! completion attempt may ever observe a given state. The Redis
//! implementation relies on GETDEL for this; a read followed by a separate
//! delete would be a replay window.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::BiometricChallenge;
use crate::services::error::ServiceError;

#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Stores the challenge under (tenant, state) for `ttl_seconds`.
    async fn put(
        &self,
        challenge: &BiometricChallenge,
        ttl_seconds: i64,
    ) -> Result<(), ServiceError>;

    /// Atomically fetches and deletes the challenge. Returns `None` when the
    /// state is absent, expired or already consumed.
    async fn take(
        &self,
        tenant_id: &str,
        state: &str,
    ) -> Result<Option<BiometricChallenge>, ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

fn challenge_key(tenant_id: &str, state: &str) -> String {
    format!("biometric:challenge:{}:{}", tenant_id, state)
}

#[derive(Clone)]
pub struct RedisChallengeStore {
    manager: ConnectionManager,
}

impl RedisChallengeStore {
    pub async fn new(url: &str) -> Result<Self, ServiceError> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(url)?;
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            ServiceError::Redis(e)
        })?;
        tracing::info!("Successfully connected to Redis");
        Ok(Self { manager })
    }
}

#[async_trait]
impl ChallengeStore for RedisChallengeStore {
    async fn put(
        &self,
        challenge: &BiometricChallenge,
        ttl_seconds: i64,
    ) -> Result<(), ServiceError> {
        let mut conn = self.manager.clone();
        let payload = serde_json::to_string(challenge)
            .map_err(|e| ServiceError::Internal(anyhow::Error::new(e)))?;

        redis::cmd("SET")
            .arg(challenge_key(&challenge.tenant_id, &challenge.state))
            .arg(payload)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn take(
        &self,
        tenant_id: &str,
        state: &str,
    ) -> Result<Option<BiometricChallenge>, ServiceError> {
        let mut conn = self.manager.clone();

        // GETDEL makes consume-once atomic on the server side.
        let payload: Option<String> = redis::cmd("GETDEL")
            .arg(challenge_key(tenant_id, state))
            .query_async(&mut conn)
            .await?;

        match payload {
            Some(json) => {
                let challenge: BiometricChallenge = serde_json::from_str(&json)
                    .map_err(|e| ServiceError::Internal(anyhow::Error::new(e)))?;
                Ok(Some(challenge))
            }
            None => Ok(None),
        }
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(ServiceError::Redis)
    }
}

/// In-process store for tests. The mutex gives the same consume-once
/// guarantee GETDEL provides in Redis.
#[derive(Default)]
pub struct InMemoryChallengeStore {
    entries: Mutex<HashMap<String, (BiometricChallenge, Instant)>>,
}

impl InMemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChallengeStore for InMemoryChallengeStore {
    async fn put(
        &self,
        challenge: &BiometricChallenge,
        ttl_seconds: i64,
    ) -> Result<(), ServiceError> {
        let now = Instant::now();
        let deadline = now + Duration::from_secs(ttl_seconds.max(0) as u64);
        let mut entries = self.entries.lock().unwrap();
        // Challenges abandoned before completion would otherwise linger;
        // Redis expires them server-side, here we sweep on insert.
        entries.retain(|_, (_, deadline)| now < *deadline);
        entries.insert(
            challenge_key(&challenge.tenant_id, &challenge.state),
            (challenge.clone(), deadline),
        );
        Ok(())
    }

    async fn take(
        &self,
        tenant_id: &str,
        state: &str,
    ) -> Result<Option<BiometricChallenge>, ServiceError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.remove(&challenge_key(tenant_id, state)) {
            Some((challenge, deadline)) if Instant::now() < deadline => Ok(Some(challenge)),
            _ => Ok(None),
        }
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceMetadata, Platform};
    use chrono::Utc;

    fn sample_challenge(state: &str) -> BiometricChallenge {
        BiometricChallenge {
            tenant_id: "tenant-a".to_string(),
            state: state.to_string(),
            challenge: "Y2hhbGxlbmdl".to_string(),
            client_id: "mobile-app".to_string(),
            refresh_token_hash: "abc123".to_string(),
            device: DeviceMetadata {
                platform: Platform::Ios,
                device_id: "device-1".to_string(),
                device_model: None,
                os_version: None,
                app_version: None,
                device_name: None,
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn take_consumes_exactly_once() {
        let store = InMemoryChallengeStore::new();
        store.put(&sample_challenge("s1"), 60).await.unwrap();

        let first = store.take("tenant-a", "s1").await.unwrap();
        assert!(first.is_some());

        let second = store.take("tenant-a", "s1").await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn take_is_tenant_scoped() {
        let store = InMemoryChallengeStore::new();
        store.put(&sample_challenge("s2"), 60).await.unwrap();

        assert!(store.take("tenant-b", "s2").await.unwrap().is_none());
        assert!(store.take("tenant-a", "s2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn put_sweeps_expired_entries() {
        let store = InMemoryChallengeStore::new();
        store.put(&sample_challenge("stale-1"), 0).await.unwrap();
        store.put(&sample_challenge("stale-2"), 0).await.unwrap();
        store.put(&sample_challenge("live"), 60).await.unwrap();

        let entries = store.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key(&challenge_key("tenant-a", "live")));
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let store = InMemoryChallengeStore::new();
        store.put(&sample_challenge("s3"), 0).await.unwrap();

        assert!(store.take("tenant-a", "s3").await.unwrap().is_none());
    }
}
