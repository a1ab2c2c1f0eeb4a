use axum::{
    Router,
    body::Bytes,
    extract::State,
    response::Json,
    routing::{get, post},
};

use {serde_json::json, tracing::info};

use crate::{
    api_error::{ApiError, parse_json},
    auth_middleware::CurrentIdentity,
    server::AppState,
    services::ScanRequest,
};

/// Versioned API served to CLI and browser callers alike.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/user/me", get(me_handler))
        .route("/api/v1/scan", post(scan_handler))
}

async fn me_handler(CurrentIdentity(identity): CurrentIdentity) -> Json<serde_json::Value> {
    let principal = identity.principal();
    Json(json!({
        "id": principal.id,
        "email": principal.email,
        "name": principal.name,
        "authMethod": identity.method(),
        "credentialId": identity.credential_id(),
    }))
}

async fn scan_handler(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: ScanRequest = parse_json(&body)?;
    if request.code.trim().is_empty() {
        return Err(ApiError::BadRequest("code is required".into()));
    }
    if request.language.trim().is_empty() {
        return Err(ApiError::BadRequest("language is required".into()));
    }

    let principal = identity.principal();
    info!(
        principal = %principal.id,
        method = ?identity.method(),
        language = %request.language,
        bytes = request.code.len(),
        "scan requested"
    );
    let findings = state
        .gateway
        .services
        .scan
        .scan(principal, request)
        .await
        .map_err(ApiError::Service)?;
    Ok(Json(json!({
        "count": findings.len(),
        "findings": findings,
    })))
}
