use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::post,
};

use {
    chrono::Duration,
    secrecy::ExposeSecret,
    serde::Deserialize,
    serde_json::json,
    tracing::warn,
    warden_auth::{RequestContext, issuer::DEFAULT_LABEL},
};

use crate::{
    api_error::{ApiError, parse_json, parse_optional_json},
    auth_middleware::{CurrentIdentity, SessionIdentity},
    server::AppState,
};

/// Routes that sit behind `require_auth`.
pub fn protected_auth_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/cli/keys",
            post(create_key_handler)
                .get(list_keys_handler)
                .delete(revoke_key_handler),
        )
        .route("/api/v1/auth/verify", post(verify_handler))
}

/// Routes that authenticate on their own terms (or not at all).
pub fn public_auth_router() -> Router<AppState> {
    Router::new()
        .route("/api/cli/auth/exchange", post(exchange_handler))
        .route("/api/auth/logout", post(logout_handler))
}

// ── Credential lifecycle ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateKeyRequest {
    name: Option<String>,
    expires_in_days: Option<i64>,
}

async fn create_key_handler(
    State(state): State<AppState>,
    SessionIdentity(principal): SessionIdentity,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: CreateKeyRequest = parse_optional_json(&body)?;
    let ttl = request
        .expires_in_days
        .map(|days| {
            Duration::try_days(days)
                .ok_or_else(|| ApiError::BadRequest("expiresInDays is out of range".into()))
        })
        .transpose()?;
    let label = request.name.as_deref().unwrap_or(DEFAULT_LABEL);

    let issued = state
        .gateway
        .issuer
        .issue(&principal.id, label, ttl)
        .await?;
    let credential = &issued.credential;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "plaintext": issued.plaintext.expose_secret(),
            "id": credential.id,
            "displayPrefix": credential.display_prefix,
            "label": credential.label,
            "expiresAt": credential.expires_at,
        })),
    )
        .into_response())
}

async fn list_keys_handler(
    State(state): State<AppState>,
    SessionIdentity(principal): SessionIdentity,
) -> Result<Json<serde_json::Value>, ApiError> {
    let keys = state.gateway.issuer.list(&principal.id).await?;
    Ok(Json(json!({ "keys": keys })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevokeKeyRequest {
    credential_id: String,
}

async fn revoke_key_handler(
    State(state): State<AppState>,
    SessionIdentity(principal): SessionIdentity,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: RevokeKeyRequest = parse_json(&body)?;
    let credential = state
        .gateway
        .issuer
        .revoke(&principal.id, &request.credential_id)
        .await?;
    Ok(Json(json!({ "revoked": true, "credentialId": credential.id })))
}

// ── Exchange & verify ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeRequest {
    api_key: String,
}

async fn exchange_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: ExchangeRequest = parse_json(&body)?;
    let (principal, signed) = state
        .gateway
        .authenticator
        .exchange(request.api_key.trim())
        .await?;
    Ok(Json(json!({
        "token": signed.token,
        "tokenType": "bearer",
        "expiresInSeconds": signed.expires_in_seconds,
        "principal": principal,
    })))
}

async fn verify_handler(CurrentIdentity(identity): CurrentIdentity) -> Json<serde_json::Value> {
    Json(json!({
        "valid": true,
        "user": identity.principal(),
        "authMethod": identity.method(),
    }))
}

// ── Logout ───────────────────────────────────────────────────────────────────

async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let sessions = &state.gateway.sessions;
    if let Some(token) = RequestContext::new(&headers).cookie(sessions.cookie_name())
        && let Err(e) = sessions.delete_session(token).await
    {
        warn!(error = %e, "failed to delete session on logout");
    }
    clear_session_response(sessions.cookie_name())
}

fn clear_session_response(cookie_name: &str) -> Response {
    let cookie = format!("{cookie_name}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0");
    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "ok": true })),
    )
        .into_response()
}
