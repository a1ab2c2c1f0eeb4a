use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use {serde_json::json, tracing::error, warden_auth::AuthError};

/// Error returned by every JSON handler.
///
/// Authentication failures collapse to one body so a caller cannot tell a
/// revoked key from an unknown one.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    /// Authenticated, but by a scheme this route does not accept.
    Forbidden(&'static str),
    UnknownWebhookSource,
    BadRequest(String),
    Service(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(e) if e.is_unauthorized() => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::InvalidSignature) => StatusCode::UNAUTHORIZED,
            Self::Auth(AuthError::Conflict) => StatusCode::CONFLICT,
            Self::Auth(AuthError::NotFound) | Self::UnknownWebhookSource => StatusCode::NOT_FOUND,
            Self::Auth(AuthError::InvalidRequest(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            },
            Self::Auth(AuthError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Service(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            Self::Auth(e) if e.is_unauthorized() => json!({ "error": "unauthorized" }),
            Self::Auth(
                e @ (AuthError::InvalidSignature | AuthError::Conflict | AuthError::NotFound),
            ) => json!({ "error": e.to_string() }),
            Self::Auth(AuthError::InvalidRequest(message)) | Self::BadRequest(message) => {
                json!({ "error": message })
            },
            Self::Auth(AuthError::Unavailable(_)) => {
                json!({ "error": "auth backend unavailable", "retryable": true })
            },
            Self::Auth(_) => json!({ "error": "internal error" }),
            Self::Forbidden(message) => json!({ "error": message }),
            Self::UnknownWebhookSource => json!({ "error": "unknown webhook source" }),
            Self::Service(_) => json!({ "error": "upstream service failed" }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Auth(e @ (AuthError::Unavailable(_) | AuthError::Internal(_))) => {
                error!(error = %e, "request failed");
            },
            Self::Service(message) => error!(error = %message, "service call failed"),
            _ => {},
        }
        (status, Json(self.body())).into_response()
    }
}

/// Parse a JSON request body, mapping failures to 400.
pub fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

/// Like [`parse_json`], but an empty body yields `T::default()`.
pub fn parse_optional_json<T: serde::de::DeserializeOwned + Default>(
    body: &[u8],
) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_json(body)
}
