pub mod biometric;
pub mod challenge;
pub mod claims;
pub mod database;
pub mod error;
pub mod issuer;
pub mod metrics;
pub mod profile;
pub mod refresh;
pub mod store;
pub mod token_config;

pub use biometric::BiometricService;
pub use challenge::{ChallengeStore, InMemoryChallengeStore, RedisChallengeStore};
pub use database::Database;
pub use error::ServiceError;
pub use issuer::TokenIssuer;
pub use profile::{HttpProfileFetcher, ProfileFetcher, StaticProfiles};
pub use refresh::RefreshTokenManager;
pub use store::{ClientStore, ConfigStore, CredentialStore, InMemoryStore, RefreshTokenStore};
pub use token_config::TokenConfigProvider;
