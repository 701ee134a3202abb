//! Biometric challenge issuance and completion.
//!
//! A device proves possession of a P-256 key by signing a single-use
//! challenge. Registration submits a new public key; login references an
//! already registered credential. Both paths end in a fresh token bundle.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use rand::RngCore;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::dtos::{BiometricChallengeRequest, BiometricChallengeResponse, BiometricCompleteRequest};
use crate::models::{
    BiometricChallenge, BiometricCredential, Client, RefreshToken, SessionContext,
};
use crate::services::challenge::ChallengeStore;
use crate::services::error::ServiceError;
use crate::services::issuer::{IssuedBundle, TokenIssuer, AMR_HARDWARE_KEY};
use crate::services::store::{ClientStore, CredentialStore, RefreshTokenStore};

/// Challenge and state are both 32 random bytes; the challenge is what gets
/// signed, the state is the lookup handle.
const CHALLENGE_BYTES: usize = 32;
const STATE_BYTES: usize = 32;

#[derive(Debug)]
pub struct CompletedAuthentication {
    pub bundle: IssuedBundle,
    pub credential_id: String,
    pub mfa_factors: Vec<String>,
}

pub struct BiometricService {
    clients: Arc<dyn ClientStore>,
    credentials: Arc<dyn CredentialStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    challenges: Arc<dyn ChallengeStore>,
    issuer: Arc<TokenIssuer>,
    challenge_ttl_seconds: i64,
}

impl BiometricService {
    pub fn new(
        clients: Arc<dyn ClientStore>,
        credentials: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        challenges: Arc<dyn ChallengeStore>,
        issuer: Arc<TokenIssuer>,
        challenge_ttl_seconds: i64,
    ) -> Self {
        Self {
            clients,
            credentials,
            refresh_tokens,
            challenges,
            issuer,
            challenge_ttl_seconds,
        }
    }

    /// Issue a one-time challenge bound to the caller's refresh token,
    /// client and device. Every call produces fresh challenge and state
    /// values, also for identical inputs.
    pub async fn create_challenge(
        &self,
        tenant_id: &str,
        request: BiometricChallengeRequest,
    ) -> Result<BiometricChallengeResponse, ServiceError> {
        if request.device_metadata.device_id.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "device_id is required".to_string(),
            ));
        }

        let token_hash = RefreshToken::hash_token(&request.refresh_token);
        let token = self
            .resolve_valid_refresh_token(tenant_id, &token_hash)
            .await?;

        if token.client_id != request.client_id {
            // Same error as an unknown token so client bindings cannot be probed.
            return Err(ServiceError::Unauthorized(
                "Invalid refresh token".to_string(),
            ));
        }

        self.resolve_first_party_client(tenant_id, &request.client_id)
            .await?;

        let mut challenge_bytes = [0u8; CHALLENGE_BYTES];
        rand::thread_rng().fill_bytes(&mut challenge_bytes);
        let mut state_bytes = [0u8; STATE_BYTES];
        rand::thread_rng().fill_bytes(&mut state_bytes);

        let challenge = BiometricChallenge {
            tenant_id: tenant_id.to_string(),
            state: URL_SAFE_NO_PAD.encode(state_bytes),
            challenge: STANDARD.encode(challenge_bytes),
            client_id: request.client_id.clone(),
            refresh_token_hash: token_hash,
            device: request.device_metadata.clone(),
            created_at: Utc::now(),
        };

        self.challenges
            .put(&challenge, self.challenge_ttl_seconds)
            .await?;

        // Registration-vs-login hint for the caller.
        let credential_id = self
            .credentials
            .find_by_device(
                tenant_id,
                &request.client_id,
                &token.user_id,
                &request.device_metadata.device_id,
            )
            .await?
            .map(|c| c.credential_id);

        Ok(BiometricChallengeResponse {
            challenge: challenge.challenge,
            state: challenge.state,
            expires_in: self.challenge_ttl_seconds,
            credential_id,
        })
    }

    /// Consume the challenge state and verify the signature, then mint a
    /// fresh token set. The state is deleted before any verification so a
    /// replayed completion fails identically to an unknown state.
    pub async fn complete(
        &self,
        tenant_id: &str,
        request: BiometricCompleteRequest,
        client_ip: String,
    ) -> Result<CompletedAuthentication, ServiceError> {
        if request.device_metadata.device_id.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "device_id is required".to_string(),
            ));
        }

        let challenge = self
            .challenges
            .take(tenant_id, &request.state)
            .await?
            .ok_or(ServiceError::ChallengeNotFound)?;

        let token_hash = RefreshToken::hash_token(&request.refresh_token);
        if !bool::from(
            token_hash
                .as_bytes()
                .ct_eq(challenge.refresh_token_hash.as_bytes()),
        ) {
            return Err(ServiceError::RefreshTokenMismatch);
        }

        if request.client_id != challenge.client_id {
            return Err(ServiceError::ClientIdMismatch);
        }

        let signature_bytes = decode_base64(&request.signature)
            .ok_or(ServiceError::InvalidEncoding)?;

        let token = self
            .resolve_valid_refresh_token(tenant_id, &token_hash)
            .await?;
        let client = self
            .resolve_first_party_client(tenant_id, &request.client_id)
            .await?;

        let challenge_bytes = STANDARD
            .decode(&challenge.challenge)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Stored challenge corrupt: {}", e)))?;

        let credential = match &request.public_key {
            Some(public_key_pem) => {
                self.register(
                    tenant_id,
                    &request,
                    &challenge,
                    &token,
                    public_key_pem,
                    &challenge_bytes,
                    &signature_bytes,
                )
                .await?
            }
            None => {
                self.login(tenant_id, &request, &challenge_bytes, &signature_bytes)
                    .await?
            }
        };

        let mut amr = token.auth_methods.clone();
        if !amr.iter().any(|m| m == AMR_HARDWARE_KEY) {
            amr.push(AMR_HARDWARE_KEY.to_string());
        }

        let bundle = self
            .issuer
            .issue_bundle(tenant_id, &client.client_id, &token.user_id, &token.scope, &amr)
            .await?;

        // The presented refresh token stays valid; the new one supersedes it
        // for this device session.
        let session = SessionContext {
            device_name: challenge
                .device
                .device_name
                .clone()
                .or_else(|| challenge.device.device_model.clone())
                .unwrap_or_default(),
            ip: client_ip,
            source: challenge.device.platform.to_string(),
            location: String::new(),
        };
        let new_token = RefreshToken::new(
            tenant_id.to_string(),
            client.client_id.clone(),
            token.user_id.clone(),
            &bundle.refresh_token,
            bundle.refresh_expires_in,
            token.scope.clone(),
            amr,
            session,
        );
        self.refresh_tokens.insert(&new_token).await?;

        Ok(CompletedAuthentication {
            bundle,
            credential_id: credential.credential_id,
            mfa_factors: client.mfa_factors,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn register(
        &self,
        tenant_id: &str,
        request: &BiometricCompleteRequest,
        challenge: &BiometricChallenge,
        token: &RefreshToken,
        public_key_pem: &str,
        challenge_bytes: &[u8],
        signature_bytes: &[u8],
    ) -> Result<BiometricCredential, ServiceError> {
        // Only P-256 EC keys are accepted; RSA or malformed PEMs never reach
        // signature verification.
        let verifying_key = VerifyingKey::from_public_key_pem(public_key_pem)
            .map_err(|_| ServiceError::InvalidPublicKeyFormat)?;

        verify_signature(&verifying_key, challenge_bytes, signature_bytes)?;

        let credential = BiometricCredential::new(
            tenant_id.to_string(),
            request.client_id.clone(),
            token.user_id.clone(),
            challenge.device.device_id.clone(),
            public_key_pem.to_string(),
        );
        self.credentials.upsert(credential).await
    }

    async fn login(
        &self,
        tenant_id: &str,
        request: &BiometricCompleteRequest,
        challenge_bytes: &[u8],
        signature_bytes: &[u8],
    ) -> Result<BiometricCredential, ServiceError> {
        let credential_id = request
            .credential_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::InvalidRequest("credential_id is required".to_string())
            })?;

        let credential = self
            .credentials
            .find_by_credential_id(tenant_id, &request.client_id, credential_id)
            .await?
            .ok_or(ServiceError::CredentialNotFound)?;

        let verifying_key = VerifyingKey::from_public_key_pem(&credential.public_key)
            .map_err(|e| {
                ServiceError::Internal(anyhow::anyhow!("Stored public key corrupt: {}", e))
            })?;

        verify_signature(&verifying_key, challenge_bytes, signature_bytes)?;

        Ok(credential)
    }

    async fn resolve_valid_refresh_token(
        &self,
        tenant_id: &str,
        token_hash: &str,
    ) -> Result<RefreshToken, ServiceError> {
        let token = self
            .refresh_tokens
            .find_by_hash(tenant_id, token_hash)
            .await?
            .filter(|t| t.is_valid())
            .ok_or_else(|| ServiceError::Unauthorized("Invalid refresh token".to_string()))?;
        Ok(token)
    }

    /// Third-party and disabled clients get the same answer as an invalid
    /// token so the classification does not leak.
    async fn resolve_first_party_client(
        &self,
        tenant_id: &str,
        client_id: &str,
    ) -> Result<Client, ServiceError> {
        let client = self
            .clients
            .find_client(tenant_id, client_id)
            .await?
            .filter(|c| c.enabled && c.is_first_party())
            .ok_or_else(|| ServiceError::Unauthorized("Invalid refresh token".to_string()))?;
        Ok(client)
    }
}

fn decode_base64(value: &str) -> Option<Vec<u8>> {
    STANDARD
        .decode(value)
        .or_else(|_| URL_SAFE_NO_PAD.decode(value))
        .ok()
}

fn verify_signature(
    key: &VerifyingKey,
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), ServiceError> {
    let signature = Signature::from_der(signature_bytes)
        .or_else(|_| Signature::from_slice(signature_bytes))
        .map_err(|_| ServiceError::InvalidSignature)?;

    key.verify(message, &signature)
        .map_err(|_| ServiceError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientKind, DeviceMetadata, Platform};
    use crate::services::challenge::InMemoryChallengeStore;
    use crate::services::profile::StaticProfiles;
    use crate::services::store::InMemoryStore;
    use crate::services::token_config::TokenConfigProvider;

    fn service(store: Arc<InMemoryStore>) -> BiometricService {
        let configs = Arc::new(TokenConfigProvider::new(store.clone()));
        let issuer = Arc::new(TokenIssuer::new(configs, Arc::new(StaticProfiles::new())));
        BiometricService::new(
            store.clone(),
            store.clone(),
            store,
            Arc::new(InMemoryChallengeStore::new()),
            issuer,
            300,
        )
    }

    fn device() -> DeviceMetadata {
        DeviceMetadata {
            platform: Platform::Ios,
            device_id: "device-1".to_string(),
            device_model: Some("iPhone15,3".to_string()),
            os_version: None,
            app_version: None,
            device_name: None,
        }
    }

    fn challenge_request(refresh_token: &str, client_id: &str) -> BiometricChallengeRequest {
        BiometricChallengeRequest {
            refresh_token: refresh_token.to_string(),
            client_id: client_id.to_string(),
            device_metadata: device(),
        }
    }

    fn seed_token(store: &InMemoryStore, tenant: &str, client: &str, value: &str) {
        let token = RefreshToken::new(
            tenant.to_string(),
            client.to_string(),
            "user-1".to_string(),
            value,
            3600,
            "openid".to_string(),
            vec!["pwd".to_string()],
            SessionContext::default(),
        );
        store
            .refresh_tokens
            .lock()
            .unwrap()
            .insert((token.tenant_id.clone(), token.token_hash.clone()), token);
    }

    fn seed_client(store: &InMemoryStore, tenant: &str, client_id: &str, kind: ClientKind) {
        let client = Client::new(
            tenant.to_string(),
            client_id.to_string(),
            "Test".to_string(),
            kind,
        );
        store
            .clients
            .lock()
            .unwrap()
            .insert((tenant.to_string(), client_id.to_string()), client);
    }

    #[tokio::test]
    async fn unknown_refresh_token_is_unauthorized() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(store);

        let err = svc
            .create_challenge("tenant-a", challenge_request("nope", "mobile-app"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn third_party_client_is_rejected_like_an_invalid_token() {
        let store = Arc::new(InMemoryStore::new());
        seed_token(&store, "tenant-a", "partner-app", "rt-1");
        seed_client(&store, "tenant-a", "partner-app", ClientKind::ThirdParty);
        let svc = service(store);

        let err = svc
            .create_challenge("tenant-a", challenge_request("rt-1", "partner-app"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn repeated_challenge_calls_yield_distinct_values() {
        let store = Arc::new(InMemoryStore::new());
        seed_token(&store, "tenant-a", "mobile-app", "rt-1");
        seed_client(&store, "tenant-a", "mobile-app", ClientKind::FirstParty);
        let svc = service(store);

        let first = svc
            .create_challenge("tenant-a", challenge_request("rt-1", "mobile-app"))
            .await
            .unwrap();
        let second = svc
            .create_challenge("tenant-a", challenge_request("rt-1", "mobile-app"))
            .await
            .unwrap();

        assert_ne!(first.challenge, second.challenge);
        assert_ne!(first.state, second.state);
        assert!(first.credential_id.is_none());
    }

    #[tokio::test]
    async fn unknown_state_is_challenge_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let svc = service(store);

        let request = BiometricCompleteRequest {
            refresh_token: "rt-1".to_string(),
            state: "no-such-state".to_string(),
            client_id: "mobile-app".to_string(),
            credential_id: None,
            public_key: None,
            signature: STANDARD.encode(b"sig"),
            device_metadata: device(),
        };

        let err = svc
            .complete("tenant-a", request, "127.0.0.1".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ChallengeNotFound));
    }
}
