//! Client model - an application registered under a tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;

/// First-party clients are tenant-owned applications; third-party clients
/// integrate over OAuth and are excluded from the biometric APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    FirstParty,
    ThirdParty,
}

impl ClientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientKind::FirstParty => "first_party",
            ClientKind::ThirdParty => "third_party",
        }
    }
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for ClientKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "first_party" => Ok(ClientKind::FirstParty),
            "third_party" => Ok(ClientKind::ThirdParty),
            other => Err(format!("Invalid client kind: {}", other)),
        }
    }
}

/// Client entity, owned by the admin collaborator and read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Client {
    pub tenant_id: String,
    pub client_id: String,
    pub client_name: String,
    #[sqlx(try_from = "String")]
    pub kind: ClientKind,
    pub allowed_scopes: Vec<String>,
    /// Configured multi-factor list, passed through on biometric completion.
    pub mfa_factors: Vec<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(tenant_id: String, client_id: String, client_name: String, kind: ClientKind) -> Self {
        Self {
            tenant_id,
            client_id,
            client_name,
            kind,
            allowed_scopes: Vec::new(),
            mfa_factors: Vec::new(),
            enabled: true,
            created_at: Utc::now(),
        }
    }

    /// Biometric registration and login are restricted to first-party clients.
    pub fn is_first_party(&self) -> bool {
        self.kind == ClientKind::FirstParty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_kind_round_trips_through_storage_text() {
        let kind = ClientKind::try_from("first_party".to_string()).unwrap();
        assert_eq!(kind, ClientKind::FirstParty);
        assert_eq!(kind.as_str(), "first_party");
        assert!(ClientKind::try_from("internal".to_string()).is_err());
    }
}
