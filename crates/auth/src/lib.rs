//! Dual-mode authentication and API credential lifecycle.
//!
//! This crate provides:
//! - credential issuance, listing and revocation ([`CredentialIssuer`])
//! - verification of presented API credentials ([`CredentialVerifier`])
//! - short-lived exchange tokens ([`TokenExchanger`])
//! - browser sessions behind the [`SessionVerifier`] contract
//! - one [`Authenticator`] that every protected resource goes through
//! - HMAC verification of inbound webhook payloads ([`webhook`])

pub mod authenticator;
pub mod clock;
pub mod error;
pub mod exchange;
pub mod issuer;
pub mod principal;
pub mod request;
pub mod secret;
pub mod session;
pub mod store;
pub mod verifier;
pub mod webhook;

pub use {
    authenticator::Authenticator,
    clock::{Clock, ManualClock, SystemClock},
    error::{AuthError, Result},
    exchange::{SignedToken, TokenClaims, TokenExchanger},
    issuer::{CredentialIssuer, DEFAULT_LABEL, IssuedCredential},
    principal::{AuthIdentity, AuthMethod, NoopPrincipalDirectory, Principal, PrincipalDirectory},
    request::RequestContext,
    session::{SessionVerifier, SqliteSessionStore},
    store::{Credential, CredentialStore, NewCredential, SqliteCredentialStore},
    verifier::{CredentialVerifier, VerifiedCredential},
};

/// Run database migrations for the credential and session tables.
///
/// Safe to call repeatedly; every store constructor calls it.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
