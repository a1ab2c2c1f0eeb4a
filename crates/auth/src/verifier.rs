use std::{sync::Arc, time::Duration};

use {
    chrono::{DateTime, Utc},
    tracing::{debug, warn},
};

use crate::{
    clock::Clock,
    error::{AuthError, Result},
    secret,
    store::{Credential, CredentialStore, within},
};

/// Default deadline for a single store call during verification.
pub const DEFAULT_STORE_DEADLINE: Duration = Duration::from_secs(5);

/// Outcome of a successful credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    pub credential_id: String,
    pub owner_id: String,
    pub label: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&Credential> for VerifiedCredential {
    fn from(c: &Credential) -> Self {
        Self {
            credential_id: c.id.clone(),
            owner_id: c.owner_id.clone(),
            label: c.label.clone(),
            expires_at: c.expires_at,
        }
    }
}

pub struct CredentialVerifier {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    deadline: Duration,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            deadline: DEFAULT_STORE_DEADLINE,
        }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Check a presented plaintext credential.
    ///
    /// Order of checks: format tag, digest lookup, active flag, expiry.
    /// On success `last_used_at` is updated best-effort; a failure there is
    /// logged and does not affect the result.
    pub async fn verify(&self, presented: &str) -> Result<VerifiedCredential> {
        if !secret::has_credential_format(presented) {
            return Err(AuthError::InvalidCredential);
        }
        let digest = secret::digest(presented);
        let credential = within(self.deadline, self.store.find_by_digest(&digest))
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        let now = self.clock.now();
        check_usable(&credential, now)?;

        if let Err(e) = within(self.deadline, self.store.mark_used(&credential.id, now)).await {
            warn!(credential_id = %credential.id, error = %e, "failed to record credential use");
        }
        debug!(
            credential_id = %credential.id,
            owner_id = %credential.owner_id,
            "credential verified"
        );
        Ok(VerifiedCredential::from(&credential))
    }

    /// Re-check a credential by id, for callers holding a token bound to it.
    /// Does not touch `last_used_at`.
    pub async fn check_active(&self, credential_id: &str) -> Result<VerifiedCredential> {
        let credential = within(self.deadline, self.store.find_by_id(credential_id))
            .await?
            .ok_or(AuthError::InvalidCredential)?;
        check_usable(&credential, self.clock.now())?;
        Ok(VerifiedCredential::from(&credential))
    }
}

fn check_usable(credential: &Credential, now: DateTime<Utc>) -> Result<()> {
    if !credential.active {
        return Err(AuthError::RevokedCredential);
    }
    if credential.is_expired_at(now) {
        return Err(AuthError::ExpiredCredential);
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            clock::{ManualClock, SystemClock},
            issuer::CredentialIssuer,
            store::{NewCredential, SqliteCredentialStore},
        },
        async_trait::async_trait,
        chrono::Duration as ChronoDuration,
        secrecy::ExposeSecret,
        sqlx::SqlitePool,
    };

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    struct Fixture {
        clock: Arc<ManualClock>,
        store: Arc<SqliteCredentialStore>,
        issuer: CredentialIssuer,
        verifier: CredentialVerifier,
    }

    async fn fixture() -> Fixture {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = Arc::new(SqliteCredentialStore::new(pool).await.unwrap());
        let clock = Arc::new(ManualClock::new(t0()));
        Fixture {
            issuer: CredentialIssuer::new(store.clone(), clock.clone()),
            verifier: CredentialVerifier::new(store.clone(), clock.clone()),
            clock,
            store,
        }
    }

    #[tokio::test]
    async fn verify_returns_owner_and_is_idempotent() {
        let f = fixture().await;
        let issued = f.issuer.issue("u1", "k", None).await.unwrap();
        let plain = issued.plaintext.expose_secret();

        let first = f.verifier.verify(plain).await.unwrap();
        f.clock.advance(ChronoDuration::seconds(10));
        let second = f.verifier.verify(plain).await.unwrap();
        assert_eq!(first.owner_id, "u1");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn verify_marks_last_used() {
        let f = fixture().await;
        let issued = f.issuer.issue("u1", "k", None).await.unwrap();
        f.clock.advance(ChronoDuration::minutes(3));
        f.verifier
            .verify(issued.plaintext.expose_secret())
            .await
            .unwrap();
        let stored = f
            .store
            .find_by_id(&issued.credential.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.last_used_at, Some(t0() + ChronoDuration::minutes(3)));
    }

    #[tokio::test]
    async fn wrong_tag_is_rejected_before_lookup() {
        let f = fixture().await;
        let err = f.verifier.verify("mk_deadbeef").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential));
    }

    #[tokio::test]
    async fn unknown_credential_is_invalid() {
        let f = fixture().await;
        let stranger = secret::generate();
        let err = f
            .verifier
            .verify(stranger.expose_secret())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential));
    }

    #[tokio::test]
    async fn revocation_is_permanent() {
        let f = fixture().await;
        let issued = f.issuer.issue("u1", "k", None).await.unwrap();
        f.issuer.revoke("u1", &issued.credential.id).await.unwrap();
        for _ in 0..3 {
            f.clock.advance(ChronoDuration::days(1));
            let err = f
                .verifier
                .verify(issued.plaintext.expose_secret())
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::RevokedCredential));
            assert!(err.is_unauthorized());
        }
    }

    #[tokio::test]
    async fn expiry_boundary_instant_is_expired() {
        let f = fixture().await;
        let issued = f
            .issuer
            .issue("u1", "k", Some(ChronoDuration::seconds(60)))
            .await
            .unwrap();
        let plain = issued.plaintext.expose_secret();

        f.clock.set(t0() + ChronoDuration::milliseconds(59_999));
        assert!(f.verifier.verify(plain).await.is_ok());

        f.clock.set(t0() + ChronoDuration::seconds(60));
        assert!(matches!(
            f.verifier.verify(plain).await.unwrap_err(),
            AuthError::ExpiredCredential
        ));
    }

    #[tokio::test]
    async fn one_second_ttl_expires_in_real_time() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = Arc::new(SqliteCredentialStore::new(pool).await.unwrap());
        let clock = Arc::new(SystemClock);
        let issuer = CredentialIssuer::new(store.clone(), clock.clone());
        let verifier = CredentialVerifier::new(store, clock);

        let issued = issuer
            .issue("u1", "k", Some(ChronoDuration::seconds(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let err = verifier
            .verify(issued.plaintext.expose_secret())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ExpiredCredential));
    }

    #[tokio::test]
    async fn ownership_scenario() {
        let f = fixture().await;
        let issued = f.issuer.issue("u1", "k", None).await.unwrap();
        let id = &issued.credential.id;

        assert!(matches!(
            f.issuer.revoke("u2", id).await.unwrap_err(),
            AuthError::NotFound
        ));
        assert!(
            f.verifier
                .verify(issued.plaintext.expose_secret())
                .await
                .is_ok()
        );
        f.issuer.revoke("u1", id).await.unwrap();
        assert!(
            f.verifier
                .verify(issued.plaintext.expose_secret())
                .await
                .unwrap_err()
                .is_unauthorized()
        );
    }

    #[tokio::test]
    async fn check_active_tracks_revocation() {
        let f = fixture().await;
        let issued = f.issuer.issue("u1", "k", None).await.unwrap();
        let id = &issued.credential.id;
        assert_eq!(f.verifier.check_active(id).await.unwrap().owner_id, "u1");
        f.issuer.revoke("u1", id).await.unwrap();
        assert!(matches!(
            f.verifier.check_active(id).await.unwrap_err(),
            AuthError::RevokedCredential
        ));
        assert!(matches!(
            f.verifier.check_active("nope").await.unwrap_err(),
            AuthError::InvalidCredential
        ));
    }

    /// Store whose lookups succeed but whose writes always fail.
    struct ReadOnlyStore {
        credential: Credential,
    }

    #[async_trait]
    impl CredentialStore for ReadOnlyStore {
        async fn insert(&self, _record: NewCredential) -> Result<Credential> {
            Err(AuthError::Unavailable("read only".into()))
        }

        async fn find_by_digest(&self, _digest: &str) -> Result<Option<Credential>> {
            Ok(Some(self.credential.clone()))
        }

        async fn find_by_id(&self, _id: &str) -> Result<Option<Credential>> {
            Ok(Some(self.credential.clone()))
        }

        async fn find_by_owner(&self, _owner_id: &str) -> Result<Vec<Credential>> {
            Ok(vec![self.credential.clone()])
        }

        async fn mark_used(&self, _id: &str, _at: DateTime<Utc>) -> Result<()> {
            Err(AuthError::Unavailable("read only".into()))
        }

        async fn set_active(
            &self,
            _id: &str,
            _owner_id: &str,
            _active: bool,
            _at: DateTime<Utc>,
        ) -> Result<Credential> {
            Err(AuthError::Unavailable("read only".into()))
        }
    }

    #[tokio::test]
    async fn mark_used_failure_does_not_fail_verification() {
        let credential = Credential {
            id: "k1".into(),
            owner_id: "u1".into(),
            display_prefix: "wk_000000000".into(),
            label: "k".into(),
            active: true,
            created_at: t0(),
            updated_at: t0(),
            last_used_at: None,
            expires_at: None,
        };
        let verifier = CredentialVerifier::new(
            Arc::new(ReadOnlyStore { credential }),
            Arc::new(ManualClock::new(t0())),
        );
        let verified = verifier.verify("wk_anything").await.unwrap();
        assert_eq!(verified.owner_id, "u1");
    }

    /// Store that never answers.
    struct StalledStore;

    #[async_trait]
    impl CredentialStore for StalledStore {
        async fn insert(&self, _record: NewCredential) -> Result<Credential> {
            std::future::pending().await
        }

        async fn find_by_digest(&self, _digest: &str) -> Result<Option<Credential>> {
            std::future::pending().await
        }

        async fn find_by_id(&self, _id: &str) -> Result<Option<Credential>> {
            std::future::pending().await
        }

        async fn find_by_owner(&self, _owner_id: &str) -> Result<Vec<Credential>> {
            std::future::pending().await
        }

        async fn mark_used(&self, _id: &str, _at: DateTime<Utc>) -> Result<()> {
            std::future::pending().await
        }

        async fn set_active(
            &self,
            _id: &str,
            _owner_id: &str,
            _active: bool,
            _at: DateTime<Utc>,
        ) -> Result<Credential> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn store_timeout_fails_closed() {
        let verifier = CredentialVerifier::new(Arc::new(StalledStore), Arc::new(SystemClock))
            .with_deadline(Duration::from_millis(20));
        let err = verifier.verify("wk_anything").await.unwrap_err();
        assert!(matches!(err, AuthError::Unavailable(_)));
        assert!(!err.is_unauthorized());
    }
}
