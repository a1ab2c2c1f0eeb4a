use thiserror::Error;

/// Every way an authentication or credential-lifecycle call can fail.
///
/// The credential and token variants are distinct so they can be logged, but
/// callers at a trust boundary should only look at [`AuthError::is_unauthorized`].
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credential presented")]
    MissingCredential,

    #[error("credential is malformed or unknown")]
    InvalidCredential,

    #[error("credential has been revoked")]
    RevokedCredential,

    #[error("credential has expired")]
    ExpiredCredential,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token has expired")]
    ExpiredToken,

    #[error("invalid signature")]
    InvalidSignature,

    /// Digest collision on insert. Indicates a broken entropy source.
    #[error("credential digest already exists")]
    Conflict,

    /// No record with this id, or it belongs to another principal.
    #[error("credential not found for this account")]
    NotFound,

    #[error("auth backend unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// True for every failure that must surface as a uniform "unauthorized".
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential
                | Self::InvalidCredential
                | Self::RevokedCredential
                | Self::ExpiredCredential
                | Self::InvalidToken(_)
                | Self::ExpiredToken
        )
    }

    /// Short, stable name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidCredential => "invalid_credential",
            Self::RevokedCredential => "revoked_credential",
            Self::ExpiredCredential => "expired_credential",
            Self::InvalidToken(_) => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::InvalidSignature => "invalid_signature",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Unavailable(_) => "unavailable",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => Self::Conflict,
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => Self::NotFound,
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::ExpiredToken,
            ErrorKind::InvalidSignature => Self::InvalidToken("signature mismatch".into()),
            ErrorKind::InvalidToken => Self::InvalidToken("malformed token".into()),
            ErrorKind::InvalidAlgorithm => Self::InvalidToken("unexpected algorithm".into()),
            _ => Self::InvalidToken(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
