use std::sync::Arc;

use {
    axum::{
        Router,
        extract::State,
        http::header,
        response::{IntoResponse, Json},
        routing::get,
    },
    tokio::net::TcpListener,
    tower_http::{
        cors::{Any, CorsLayer},
        sensitive_headers::SetSensitiveRequestHeadersLayer,
        trace::TraceLayer,
    },
    tracing::{error, info, warn},
};

use warden_config::{Severity, WardenConfig, validate};

use crate::{
    api_routes::api_router,
    auth_middleware::require_auth,
    auth_routes::{protected_auth_router, public_auth_router},
    services::GatewayServices,
    state::{GatewayState, connect_pool},
    webhook_routes::webhook_router,
};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayState>,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app_state = AppState { gateway: state };

    // Every route here goes through the one authenticator.
    let protected = Router::new()
        .merge(protected_auth_router())
        .merge(api_router())
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(public_auth_router())
        .merge(webhook_router())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(SetSensitiveRequestHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
        ]))
        .layer(cors)
        .with_state(app_state)
}

/// Start the gateway HTTP server and run until Ctrl-C / SIGTERM.
///
/// The database pool is opened once here, shared by every component, and
/// closed after the server has drained.
pub async fn start_gateway(
    config: WardenConfig,
    services: GatewayServices,
) -> anyhow::Result<()> {
    let validation = validate::validate_config(&config);
    for d in &validation.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => {},
        }
    }
    if validation.has_errors() {
        anyhow::bail!("configuration has errors; run `warden config check` for details");
    }

    let pool = connect_pool(&config).await?;
    let state = GatewayState::new(&config, pool.clone(), services).await?;

    match state.sessions.cleanup_expired_sessions().await {
        Ok(0) => {},
        Ok(n) => info!(removed = n, "expired sessions cleaned up"),
        Err(e) => warn!(error = %e, "failed to clean up expired sessions"),
    }
    if state.webhooks.is_empty() {
        info!("no webhook sources configured");
    }

    let listener = TcpListener::bind((config.server.bind.as_str(), config.server.port)).await?;
    let addr = listener.local_addr()?;
    info!(
        %addr,
        version = %state.version,
        webhook_sources = state.webhooks.len(),
        recheck_credential = config.auth.token_recheck_credential,
        "warden gateway listening"
    );

    let app = build_gateway_app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.gateway.version,
    }))
}
