use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    anyhow::Context,
    sqlx::{SqlitePool, sqlite::SqlitePoolOptions},
    tracing::info,
};

use {
    warden_auth::{
        Authenticator, Clock, CredentialIssuer, CredentialVerifier, SqliteCredentialStore,
        SqliteSessionStore, SystemClock, TokenExchanger,
    },
    warden_config::{WardenConfig, WebhookSourceConfig},
};

use crate::services::GatewayServices;

/// Everything a request handler needs, constructed once at startup.
pub struct GatewayState {
    pub version: String,
    pub pool: SqlitePool,
    pub clock: Arc<dyn Clock>,
    pub credentials: Arc<SqliteCredentialStore>,
    pub issuer: CredentialIssuer,
    pub sessions: Arc<SqliteSessionStore>,
    pub authenticator: Authenticator,
    pub webhooks: HashMap<String, WebhookSourceConfig>,
    pub services: GatewayServices,
}

impl GatewayState {
    pub async fn new(
        config: &WardenConfig,
        pool: SqlitePool,
        services: GatewayServices,
    ) -> anyhow::Result<Arc<Self>> {
        Self::with_clock(config, pool, services, Arc::new(SystemClock)).await
    }

    /// Build the state with an explicit clock (tests use a manual one).
    pub async fn with_clock(
        config: &WardenConfig,
        pool: SqlitePool,
        services: GatewayServices,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Arc<Self>> {
        let auth = &config.auth;
        let secret = auth
            .token_secret
            .as_ref()
            .context("auth.token_secret is not set (WARDEN_TOKEN_SECRET)")?;
        let deadline = Duration::from_millis(auth.store_timeout_ms);

        let credentials = Arc::new(SqliteCredentialStore::new(pool.clone()).await?);
        let sessions = Arc::new(
            SqliteSessionStore::new(pool.clone(), Arc::clone(&clock))
                .await?
                .with_cookie_name(auth.session_cookie.clone())
                .with_ttl(chrono::Duration::days(i64::from(auth.session_ttl_days))),
        );
        let tokens = Arc::new(TokenExchanger::new(
            secret,
            auth.token_ttl_secs,
            Arc::clone(&clock),
        )?);
        let verifier = Arc::new(
            CredentialVerifier::new(credentials.clone(), Arc::clone(&clock))
                .with_deadline(deadline),
        );
        let authenticator = Authenticator::new(verifier, tokens, sessions.clone(), sessions.clone())
            .with_credential_recheck(auth.token_recheck_credential)
            .with_deadline(deadline);

        Ok(Arc::new(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            issuer: CredentialIssuer::new(credentials.clone(), Arc::clone(&clock)),
            pool,
            clock,
            credentials,
            sessions,
            authenticator,
            webhooks: config.webhooks.clone(),
            services,
        }))
    }
}

/// Open the SQLite pool described by `config`, creating the data directory
/// for the default database file.
pub async fn connect_pool(config: &WardenConfig) -> anyhow::Result<SqlitePool> {
    let url = match &config.database.url {
        Some(url) => url.clone(),
        None => {
            let data_dir = warden_config::data_dir();
            std::fs::create_dir_all(&data_dir)
                .with_context(|| format!("failed to create {}", data_dir.display()))?;
            format!("sqlite:{}?mode=rwc", data_dir.join("warden.db").display())
        },
    };
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections.max(1))
        .connect(&url)
        .await
        .with_context(|| format!("failed to open database {url}"))?;
    info!(url = %url, "database opened");
    Ok(pool)
}
