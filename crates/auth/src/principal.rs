use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::error::Result;

/// The authenticated party a request acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Principal {
    /// A principal known only by id.
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Session,
    ApiKey,
    ExchangeToken,
}

/// Result of the unified authenticator: which scheme succeeded and for whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthIdentity {
    Session(Principal),
    ApiKey {
        principal: Principal,
        credential_id: String,
    },
    ExchangeToken {
        principal: Principal,
        credential_id: String,
    },
}

impl AuthIdentity {
    pub fn principal(&self) -> &Principal {
        match self {
            Self::Session(principal)
            | Self::ApiKey { principal, .. }
            | Self::ExchangeToken { principal, .. } => principal,
        }
    }

    pub fn method(&self) -> AuthMethod {
        match self {
            Self::Session(_) => AuthMethod::Session,
            Self::ApiKey { .. } => AuthMethod::ApiKey,
            Self::ExchangeToken { .. } => AuthMethod::ExchangeToken,
        }
    }

    /// The credential behind a key or token identity.
    pub fn credential_id(&self) -> Option<&str> {
        match self {
            Self::Session(_) => None,
            Self::ApiKey { credential_id, .. } | Self::ExchangeToken { credential_id, .. } => {
                Some(credential_id)
            },
        }
    }
}

/// Resolves profile fields for a principal id. Owned by the surrounding
/// identity system; `Ok(None)` means "no profile", not "no such principal".
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn lookup(&self, id: &str) -> Result<Option<Principal>>;
}

/// Directory with no profiles; every principal resolves to its bare id.
pub struct NoopPrincipalDirectory;

#[async_trait]
impl PrincipalDirectory for NoopPrincipalDirectory {
    async fn lookup(&self, _id: &str) -> Result<Option<Principal>> {
        Ok(None)
    }
}
