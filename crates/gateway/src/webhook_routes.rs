//! Inbound webhooks, one shared secret per configured source.
//!
//! The signature is checked against the raw body bytes before anything is
//! parsed; an unsigned or mis-signed payload never reaches a service.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::post,
};

use {
    secrecy::ExposeSecret,
    tracing::{info, warn},
    warden_auth::{AuthError, webhook},
};

use crate::{
    api_error::{ApiError, parse_json},
    server::AppState,
    services::WebhookEvent,
};

pub fn webhook_router() -> Router<AppState> {
    Router::new().route("/api/webhooks/{source}", post(webhook_handler))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

async fn webhook_handler(
    State(state): State<AppState>,
    Path(source): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(config) = state.gateway.webhooks.get(&source) else {
        warn!(source = %source, "webhook for unknown source");
        return Err(ApiError::UnknownWebhookSource);
    };

    let Some(signature) = header_str(&headers, &config.signature_header) else {
        warn!(source = %source, "webhook without signature header");
        return Err(AuthError::InvalidSignature.into());
    };
    if let Err(e) = webhook::verify_signature(
        &body,
        signature,
        config.secret.expose_secret().as_bytes(),
    ) {
        warn!(source = %source, "webhook signature mismatch");
        return Err(e.into());
    }

    let event = header_str(&headers, &config.event_header)
        .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", config.event_header)))?
        .to_string();
    let delivery_id = header_str(&headers, &config.delivery_header).map(str::to_string);
    let payload = parse_json(&body)?;

    info!(source = %source, event = %event, delivery_id = ?delivery_id, "webhook verified");
    let response = state
        .gateway
        .services
        .webhooks
        .dispatch(WebhookEvent {
            source,
            event,
            delivery_id,
            payload,
        })
        .await
        .map_err(ApiError::Service)?;
    Ok(Json(response))
}
