pub mod biometric;
pub mod client;
pub mod refresh_token;
pub mod token_config;

pub use biometric::{BiometricChallenge, BiometricCredential, DeviceMetadata, Platform};
pub use client::{Client, ClientKind};
pub use refresh_token::{RefreshToken, SessionContext};
pub use token_config::{CookiePolicy, SameSitePolicy, SigningKey, TokenAlgorithm, TokenConfig};
