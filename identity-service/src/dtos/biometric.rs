use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::DeviceMetadata;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BiometricChallengeRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    #[schema(example = "b64url-opaque-token")]
    pub refresh_token: String,
    #[validate(length(min = 1, message = "client_id is required"))]
    #[schema(example = "mobile-app")]
    pub client_id: String,
    pub device_metadata: DeviceMetadata,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BiometricChallengeResponse {
    /// Random challenge bytes, base64 encoded. Sign these raw bytes.
    pub challenge: String,
    /// Single-use correlation token for the follow-up complete call.
    pub state: String,
    #[schema(example = 300)]
    pub expires_in: i64,
    /// Present when the device already holds a registered credential.
    pub credential_id: Option<String>,
}

/// Completion body for both registration and login. The presence of
/// `public_key` selects registration; its absence selects login.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BiometricCompleteRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub refresh_token: String,
    #[validate(length(min = 1, message = "state is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "client_id is required"))]
    #[schema(example = "mobile-app")]
    pub client_id: String,
    /// Required for login, ignored for registration.
    pub credential_id: Option<String>,
    /// PEM-encoded P-256 public key. Present only for registration.
    pub public_key: Option<String>,
    /// Signature over the raw challenge bytes, base64 encoded.
    #[validate(length(min = 1, message = "signature is required"))]
    pub signature: String,
    pub device_metadata: DeviceMetadata,
}
