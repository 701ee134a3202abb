pub mod auth;
pub mod metrics;
pub mod tenant;

pub use auth::BearerToken;
pub use tenant::TenantId;
