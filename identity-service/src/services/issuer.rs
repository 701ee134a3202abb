//! Token issuance and validation.
//!
//! Signs access/ID tokens with the tenant's current RSA key, embeds the
//! key id in the header, and enriches claims from the external profile per
//! the tenant's claim-extraction paths. Profile failures degrade to a token
//! without extracted claims; a missing signing key is fatal.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{
    decode, decode_header, encode, DecodingKey, EncodingKey, Header, Validation,
};
use rand::RngCore;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{RefreshToken, TokenAlgorithm, TokenConfig};
use crate::services::claims::extract_claims;
use crate::services::error::ServiceError;
use crate::services::profile::ProfileFetcher;
use crate::services::token_config::TokenConfigProvider;

/// AMR marker for authentications backed by a device-bound hardware key.
pub const AMR_HARDWARE_KEY: &str = "hwk";

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    /// Tenant id.
    pub tid: String,
    /// Client id, duplicated from `aud` for downstream convenience.
    pub cid: String,
    pub jti: String,
    pub scope: String,
    /// Hash of the refresh token this access token was derived from.
    pub rft_id: String,
    pub amr: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub tid: String,
    pub cid: String,
    pub jti: String,
    pub amr: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of a full issuance: the refresh token is the opaque plaintext,
/// handed to the caller exactly once and stored only as a hash.
#[derive(Debug)]
pub struct IssuedBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
    pub config: Arc<TokenConfig>,
}

#[derive(Debug)]
pub struct IssuedAccess {
    pub access_token: String,
    pub expires_in: i64,
    pub config: Arc<TokenConfig>,
}

#[derive(Debug, Serialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub alg: String,
    pub kid: String,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Serialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

pub struct TokenIssuer {
    configs: Arc<TokenConfigProvider>,
    profiles: Arc<dyn ProfileFetcher>,
}

impl TokenIssuer {
    pub fn new(configs: Arc<TokenConfigProvider>, profiles: Arc<dyn ProfileFetcher>) -> Self {
        Self { configs, profiles }
    }

    /// New opaque refresh token value, 32 random bytes base64url encoded.
    pub fn generate_opaque_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Mint a full access/refresh/ID token set for a fresh authentication.
    pub async fn issue_bundle(
        &self,
        tenant_id: &str,
        client_id: &str,
        user_id: &str,
        scope: &str,
        auth_methods: &[String],
    ) -> Result<IssuedBundle, ServiceError> {
        let config = self.configs.get(tenant_id).await?;
        let (header, encoding_key) = self.signing_material(&config)?;

        let refresh_token = Self::generate_opaque_token();
        let rft_id = RefreshToken::hash_token(&refresh_token);
        let profile = self.fetch_profile(tenant_id, user_id).await;

        let now = Utc::now().timestamp();
        let access_claims = AccessClaims {
            sub: user_id.to_string(),
            iss: config.issuer.clone(),
            aud: client_id.to_string(),
            tid: tenant_id.to_string(),
            cid: client_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            scope: scope.to_string(),
            rft_id,
            amr: auth_methods.to_vec(),
            iat: now,
            exp: now + config.access_token_ttl_seconds,
            extra: extracted(&profile, &config.access_claim_paths),
        };

        let id_claims = IdClaims {
            sub: user_id.to_string(),
            iss: config.issuer.clone(),
            aud: client_id.to_string(),
            tid: tenant_id.to_string(),
            cid: client_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            amr: auth_methods.to_vec(),
            iat: now,
            exp: now + config.id_token_ttl_seconds,
            extra: extracted(&profile, &config.id_claim_paths),
        };

        let access_token = encode(&header, &access_claims, &encoding_key)
            .map_err(|e| ServiceError::TokenConfig(format!("Failed to sign access token: {}", e)))?;
        let id_token = encode(&header, &id_claims, &encoding_key)
            .map_err(|e| ServiceError::TokenConfig(format!("Failed to sign id token: {}", e)))?;

        Ok(IssuedBundle {
            access_token,
            refresh_token,
            id_token,
            expires_in: config.access_token_ttl_seconds,
            refresh_expires_in: config.refresh_token_ttl_seconds,
            config,
        })
    }

    /// Mint an access token bound to an existing refresh token's `rft_id`.
    pub async fn issue_access(
        &self,
        tenant_id: &str,
        client_id: &str,
        user_id: &str,
        scope: &str,
        auth_methods: &[String],
        rft_id: &str,
    ) -> Result<IssuedAccess, ServiceError> {
        let config = self.configs.get(tenant_id).await?;
        let (header, encoding_key) = self.signing_material(&config)?;
        let profile = self.fetch_profile(tenant_id, user_id).await;

        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user_id.to_string(),
            iss: config.issuer.clone(),
            aud: client_id.to_string(),
            tid: tenant_id.to_string(),
            cid: client_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            scope: scope.to_string(),
            rft_id: rft_id.to_string(),
            amr: auth_methods.to_vec(),
            iat: now,
            exp: now + config.access_token_ttl_seconds,
            extra: extracted(&profile, &config.access_claim_paths),
        };

        let access_token = encode(&header, &claims, &encoding_key)
            .map_err(|e| ServiceError::TokenConfig(format!("Failed to sign access token: {}", e)))?;

        Ok(IssuedAccess {
            access_token,
            expires_in: config.access_token_ttl_seconds,
            config,
        })
    }

    /// Validate a bearer access token for the tenant. Expired, malformed and
    /// client-mismatched tokens produce distinct descriptions, surfaced via
    /// `WWW-Authenticate`.
    pub async fn validate_access_token(
        &self,
        tenant_id: &str,
        token: &str,
        expected_client_id: Option<&str>,
    ) -> Result<AccessClaims, ServiceError> {
        let config = self.configs.get(tenant_id).await?;

        let header = decode_header(token)
            .map_err(|_| ServiceError::InvalidToken(MALFORMED_TOKEN.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| ServiceError::InvalidToken(MALFORMED_TOKEN.to_string()))?;
        let key = config
            .key_by_kid(&kid)
            .ok_or_else(|| ServiceError::InvalidToken(MALFORMED_TOKEN.to_string()))?;

        let decoding_key = DecodingKey::from_rsa_pem(key.public_key_pem.as_bytes())
            .map_err(|e| ServiceError::TokenConfig(format!("Unusable public key {}: {}", kid, e)))?;

        let mut validation = Validation::new(config.algorithm.to_jwt());
        validation.validate_aud = false;

        let data = decode::<AccessClaims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ServiceError::InvalidToken(EXPIRED_TOKEN.to_string())
                }
                _ => ServiceError::InvalidToken(MALFORMED_TOKEN.to_string()),
            }
        })?;

        if data.claims.tid != tenant_id {
            return Err(ServiceError::InvalidToken(MALFORMED_TOKEN.to_string()));
        }

        if let Some(expected) = expected_client_id {
            if data.claims.cid != expected {
                return Err(ServiceError::InvalidToken(CLIENT_MISMATCH.to_string()));
            }
        }

        Ok(data.claims)
    }

    /// Published verification keys for the tenant, current and rotated.
    pub async fn jwks(&self, tenant_id: &str) -> Result<Jwks, ServiceError> {
        let config = self.configs.get(tenant_id).await?;
        let alg = algorithm_name(config.algorithm);

        let mut keys = Vec::with_capacity(config.keys.len());
        for key in &config.keys {
            let public = RsaPublicKey::from_public_key_pem(&key.public_key_pem).map_err(|e| {
                ServiceError::TokenConfig(format!("Unusable public key {}: {}", key.kid, e))
            })?;

            keys.push(Jwk {
                kty: "RSA".to_string(),
                use_: "sig".to_string(),
                alg: alg.to_string(),
                kid: key.kid.clone(),
                n: URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
                e: URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
            });
        }

        Ok(Jwks { keys })
    }

    fn signing_material(
        &self,
        config: &TokenConfig,
    ) -> Result<(Header, EncodingKey), ServiceError> {
        let key = config
            .current_key()
            .ok_or_else(|| ServiceError::TokenConfig("No current signing key".to_string()))?;

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key_pem.as_bytes())
            .map_err(|e| {
                ServiceError::TokenConfig(format!("Unusable private key {}: {}", key.kid, e))
            })?;

        let mut header = Header::new(config.algorithm.to_jwt());
        header.kid = Some(key.kid.clone());

        Ok((header, encoding_key))
    }

    async fn fetch_profile(&self, tenant_id: &str, user_id: &str) -> Option<Value> {
        match self.profiles.fetch(tenant_id, user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                // Best-effort: issuance proceeds without extracted claims.
                tracing::warn!(
                    tenant_id = %tenant_id,
                    user_id = %user_id,
                    error = %e,
                    "Profile fetch failed, issuing token without extracted claims"
                );
                None
            }
        }
    }
}

const EXPIRED_TOKEN: &str = "The access token has expired";
const MALFORMED_TOKEN: &str = "The access token is malformed or has an invalid signature";
const CLIENT_MISMATCH: &str = "The access token was issued to a different client";

fn extracted(profile: &Option<Value>, paths: &[String]) -> Map<String, Value> {
    match profile {
        Some(profile) if !paths.is_empty() => extract_claims(profile, paths),
        _ => Map::new(),
    }
}

fn algorithm_name(algorithm: TokenAlgorithm) -> &'static str {
    match algorithm {
        TokenAlgorithm::RS256 => "RS256",
        TokenAlgorithm::RS512 => "RS512",
    }
}
