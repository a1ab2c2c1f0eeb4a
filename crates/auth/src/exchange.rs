//! Short-lived HS256 tokens issued in exchange for a verified credential.
//!
//! Tokens are stateless: verification checks the signature and `exp` only.
//! A token therefore stays valid until its own expiry even if the credential
//! it was minted from is revoked; the authenticator can be configured to
//! re-check the credential on every use instead.

use std::sync::Arc;

use {
    jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{
    clock::Clock,
    error::{AuthError, Result},
};

/// Default token lifetime: 7 days.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 604_800;

/// Shortest accepted HS256 signing key (256 bits).
pub const MIN_TOKEN_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Owning principal id.
    pub sub: String,
    /// Credential the token was exchanged for.
    pub cid: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub claims: TokenClaims,
    pub expires_in_seconds: u64,
}

pub struct TokenExchanger {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl TokenExchanger {
    pub fn new(secret: &Secret<String>, ttl_secs: u64, clock: Arc<dyn Clock>) -> Result<Self> {
        let key = secret.expose_secret().as_bytes();
        if key.len() < MIN_TOKEN_SECRET_BYTES {
            return Err(AuthError::InvalidRequest(format!(
                "token signing secret is {} bytes; at least {MIN_TOKEN_SECRET_BYTES} are required",
                key.len()
            )));
        }
        if ttl_secs == 0 || i64::try_from(ttl_secs).is_err() {
            return Err(AuthError::InvalidRequest(
                "token lifetime must be positive".into(),
            ));
        }

        // Expiry is checked against the injected clock, not the system time.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            ttl_secs,
            clock,
        })
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Mint a token binding `owner_id` and `credential_id`. The caller must
    /// already have verified the credential.
    pub fn exchange(&self, owner_id: &str, credential_id: &str) -> Result<SignedToken> {
        let iat = self.clock.now().timestamp();
        let claims = TokenClaims {
            sub: owner_id.to_string(),
            cid: credential_id.to_string(),
            iat,
            exp: iat.saturating_add_unsigned(self.ttl_secs),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {e}")))?;
        debug!(owner_id, credential_id, exp = claims.exp, "exchange token issued");
        Ok(SignedToken {
            token,
            claims,
            expires_in_seconds: self.ttl_secs,
        })
    }

    /// Check signature and expiry. `exp == now` is expired.
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation)?;
        let claims = data.claims;
        if claims.exp <= self.clock.now().timestamp() {
            return Err(AuthError::ExpiredToken);
        }
        Ok(claims)
    }
}

/// Three non-empty base64url segments separated by dots.
pub fn looks_like_token(value: &str) -> bool {
    let mut segments = 0;
    for part in value.split('.') {
        segments += 1;
        if part.is_empty()
            || !part
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return false;
        }
    }
    segments == 3
}
