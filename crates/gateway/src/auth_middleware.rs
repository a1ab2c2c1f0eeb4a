use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use warden_auth::{AuthError, AuthIdentity, Principal, RequestContext};

use crate::{api_error::ApiError, server::AppState};

/// Middleware that protects routes behind the unified authenticator.
///
/// On success the [`AuthIdentity`] is stored in the request extensions; the
/// handlers behind this layer never inspect credentials themselves.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let result = {
        let ctx = RequestContext::new(request.headers());
        state.gateway.authenticator.authenticate(&ctx).await
    };
    match result {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        },
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// The identity `require_auth` resolved, whatever the scheme.
pub struct CurrentIdentity(pub AuthIdentity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthIdentity>()
            .cloned()
            .map(CurrentIdentity)
            .ok_or(ApiError::Auth(AuthError::MissingCredential))
    }
}

/// A principal authenticated by browser session. Key and token callers get
/// 403: credentials cannot be used to mint or revoke credentials.
pub struct SessionIdentity(pub Principal);

impl<S> FromRequestParts<S> for SessionIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match CurrentIdentity::from_request_parts(parts, state).await?.0 {
            AuthIdentity::Session(principal) => Ok(SessionIdentity(principal)),
            _ => Err(ApiError::Forbidden("a browser session is required")),
        }
    }
}
