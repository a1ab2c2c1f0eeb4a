use std::sync::Arc;

use {
    chrono::Duration,
    secrecy::{ExposeSecret, Secret},
    tracing::info,
};

use crate::{
    clock::Clock,
    error::{AuthError, Result},
    secret,
    store::{Credential, CredentialStore, NewCredential},
};

/// Label used when the caller does not name a credential.
pub const DEFAULT_LABEL: &str = "CLI Access";
pub const MAX_LABEL_CHARS: usize = 100;

/// The only value that ever carries a credential's plaintext.
#[derive(Debug)]
pub struct IssuedCredential {
    pub plaintext: Secret<String>,
    pub credential: Credential,
}

/// Creates, lists and revokes credentials on behalf of an owner.
pub struct CredentialIssuer {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
}

impl CredentialIssuer {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Issue a credential. A digest conflict is returned as-is, never retried.
    pub async fn issue(
        &self,
        owner_id: &str,
        label: &str,
        ttl: Option<Duration>,
    ) -> Result<IssuedCredential> {
        if owner_id.trim().is_empty() {
            return Err(AuthError::InvalidRequest("owner id is required".into()));
        }
        let label = normalize_label(label)?;
        if ttl.is_some_and(|ttl| ttl <= Duration::zero()) {
            return Err(AuthError::InvalidRequest(
                "expiry must be in the future".into(),
            ));
        }

        let now = self.clock.now();
        let expires_at = match ttl {
            Some(ttl) => Some(now.checked_add_signed(ttl).ok_or_else(|| {
                AuthError::InvalidRequest("expiry is out of range".into())
            })?),
            None => None,
        };

        let plaintext = secret::generate();
        let record = NewCredential {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            digest: secret::digest(plaintext.expose_secret()),
            display_prefix: secret::display_prefix(plaintext.expose_secret()),
            label,
            created_at: now,
            expires_at,
        };

        let credential = self.store.insert(record).await?;
        info!(
            credential_id = %credential.id,
            owner_id = %credential.owner_id,
            prefix = %credential.display_prefix,
            expires_at = ?credential.expires_at,
            "issued credential"
        );
        Ok(IssuedCredential {
            plaintext,
            credential,
        })
    }

    pub async fn list(&self, owner_id: &str) -> Result<Vec<Credential>> {
        self.store.find_by_owner(owner_id).await
    }

    /// Deactivate `credential_id` if and only if it belongs to `owner_id`.
    pub async fn revoke(&self, owner_id: &str, credential_id: &str) -> Result<Credential> {
        let credential = self
            .store
            .set_active(credential_id, owner_id, false, self.clock.now())
            .await?;
        info!(
            credential_id = %credential.id,
            owner_id = %credential.owner_id,
            prefix = %credential.display_prefix,
            "revoked credential"
        );
        Ok(credential)
    }
}

fn normalize_label(label: &str) -> Result<String> {
    let label = label.trim();
    if label.is_empty() {
        return Ok(DEFAULT_LABEL.to_string());
    }
    if label.chars().count() > MAX_LABEL_CHARS {
        return Err(AuthError::InvalidRequest(format!(
            "label must be at most {MAX_LABEL_CHARS} characters"
        )));
    }
    Ok(label.to_string())
}
