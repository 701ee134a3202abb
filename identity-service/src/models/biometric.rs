//! Biometric challenge and credential models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Mobile platform of the device requesting biometric enrollment/login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Platform::Ios => write!(f, "ios"),
            Platform::Android => write!(f, "android"),
        }
    }
}

/// Device descriptor submitted with every biometric call.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceMetadata {
    pub platform: Platform,
    #[schema(example = "3f1c9a52-device")]
    pub device_id: String,
    #[schema(example = "iPhone15,3")]
    pub device_model: Option<String>,
    #[schema(example = "17.4")]
    pub os_version: Option<String>,
    #[schema(example = "4.12.0")]
    pub app_version: Option<String>,
    #[schema(example = "Alice's iPhone")]
    pub device_name: Option<String>,
}

/// Ephemeral challenge record, kept only in the challenge store for the
/// configured TTL and consumed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiometricChallenge {
    pub tenant_id: String,
    pub state: String,
    /// Random challenge bytes, base64 encoded.
    pub challenge: String,
    pub client_id: String,
    /// SHA-256 hash of the refresh token that requested the challenge.
    pub refresh_token_hash: String,
    pub device: DeviceMetadata,
    pub created_at: DateTime<Utc>,
}

/// Registered device public key for one (tenant, client, user, device).
///
/// Re-registration for the same device replaces the stored key; records are
/// never deleted by this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BiometricCredential {
    pub tenant_id: String,
    pub client_id: String,
    pub user_id: String,
    pub device_id: String,
    pub credential_id: String,
    /// PEM-encoded P-256 public key (ES256).
    pub public_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BiometricCredential {
    pub fn new(
        tenant_id: String,
        client_id: String,
        user_id: String,
        device_id: String,
        public_key: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            tenant_id,
            client_id,
            user_id,
            device_id,
            credential_id: Uuid::new_v4().to_string(),
            public_key,
            created_at: now,
            updated_at: now,
        }
    }
}
