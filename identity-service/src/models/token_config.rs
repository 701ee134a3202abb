//! Per-tenant token configuration: signing keys, expiries, cookie policy and
//! claim-extraction paths. Owned by the admin collaborator; this service only
//! reads it through the config cache.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenAlgorithm {
    RS256,
    RS512,
}

impl TokenAlgorithm {
    pub fn to_jwt(self) -> jsonwebtoken::Algorithm {
        match self {
            TokenAlgorithm::RS256 => jsonwebtoken::Algorithm::RS256,
            TokenAlgorithm::RS512 => jsonwebtoken::Algorithm::RS512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

/// Tenant cookie policy for the `AT`/`RT` cookies mirrored alongside the
/// token response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookiePolicy {
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    pub same_site: SameSitePolicy,
    pub secure: bool,
    pub http_only: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// One rotating signing key pair. Exactly one key per tenant carries
/// `current = true`; signing always uses that key, verification may use any
/// key resolved by `kid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningKey {
    pub kid: String,
    pub private_key_pem: String,
    pub public_key_pem: String,
    #[serde(default)]
    pub current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub algorithm: TokenAlgorithm,
    pub issuer: String,
    pub cookie: CookiePolicy,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub id_token_ttl_seconds: i64,
    /// Ordered claim-extraction paths for access tokens.
    #[serde(default)]
    pub access_claim_paths: Vec<String>,
    /// Ordered claim-extraction paths for ID tokens.
    #[serde(default)]
    pub id_claim_paths: Vec<String>,
    pub keys: Vec<SigningKey>,
}

impl TokenConfig {
    /// The key used for all new signatures.
    pub fn current_key(&self) -> Option<&SigningKey> {
        self.keys.iter().find(|k| k.current)
    }

    /// Resolve a key by its id, for verifying tokens signed by rotated keys.
    pub fn key_by_kid(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}
