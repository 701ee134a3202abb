pub mod biometric;
pub mod token;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use biometric::{BiometricChallengeRequest, BiometricChallengeResponse, BiometricCompleteRequest};
pub use token::{
    ListRefreshTokensQuery, RefreshRequest, RefreshResponse, RefreshTokenItem,
    RefreshTokenListResponse, TokenBundleResponse,
};

/// Error payload returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "invalid_request")]
    pub error: String,
    #[schema(example = "client_id is required")]
    pub error_description: String,
}
