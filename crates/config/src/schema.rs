//! Config schema types (server, database, auth, webhook sources).
use std::collections::HashMap;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

pub use warden_auth::exchange::DEFAULT_TOKEN_TTL_SECS;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    /// Inbound webhook sources, keyed by the `{source}` path segment.
    pub webhooks: HashMap<String, WebhookSourceConfig>,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8787,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL. When unset, `<data_dir>/warden.db` is used.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Name of the browser session cookie.
    pub session_cookie: String,
    pub session_ttl_days: u32,
    /// HS256 signing secret for exchange tokens. Required to run the gateway.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub token_secret: Option<Secret<String>>,
    pub token_ttl_secs: u64,
    /// Re-check the bound credential on every exchange-token use. Closes the
    /// window where a revoked credential's tokens stay valid until expiry.
    pub token_recheck_credential: bool,
    /// Deadline for a single store call made while authenticating.
    pub store_timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie: "warden_session".into(),
            session_ttl_days: 30,
            token_secret: None,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            token_recheck_credential: false,
            store_timeout_ms: 5_000,
        }
    }
}

/// One inbound webhook source (e.g. `github`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSourceConfig {
    #[serde(serialize_with = "serialize_secret")]
    pub secret: Secret<String>,
    #[serde(default = "default_signature_header")]
    pub signature_header: String,
    #[serde(default = "default_event_header")]
    pub event_header: String,
    #[serde(default = "default_delivery_header")]
    pub delivery_header: String,
}

impl WebhookSourceConfig {
    /// A source with GitHub-style header names.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Secret::new(secret.into()),
            signature_header: default_signature_header(),
            event_header: default_event_header(),
            delivery_header: default_delivery_header(),
        }
    }
}

fn default_signature_header() -> String {
    "x-hub-signature-256".into()
}

fn default_event_header() -> String {
    "x-github-event".into()
}

fn default_delivery_header() -> String {
    "x-github-delivery".into()
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg: WardenConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 8787);
        assert_eq!(cfg.auth.session_cookie, "warden_session");
        assert_eq!(cfg.auth.token_ttl_secs, DEFAULT_TOKEN_TTL_SECS);
        assert!(!cfg.auth.token_recheck_credential);
        assert!(cfg.webhooks.is_empty());
    }

    #[test]
    fn webhook_source_headers_default_to_github() {
        let cfg: WardenConfig = toml::from_str(
            r#"
[webhooks.github]
secret = "shh"
"#,
        )
        .unwrap();
        let src = &cfg.webhooks["github"];
        assert_eq!(src.secret.expose_secret(), "shh");
        assert_eq!(src.signature_header, "x-hub-signature-256");
        assert_eq!(src.event_header, "x-github-event");
        assert_eq!(src.delivery_header, "x-github-delivery");
    }

    #[test]
    fn secrets_round_trip_through_toml() {
        let mut cfg = WardenConfig::default();
        cfg.auth.token_secret = Some(Secret::new("a".repeat(32)));
        cfg.webhooks
            .insert("stripe".into(), WebhookSourceConfig::new("whsec"));
        let raw = toml::to_string_pretty(&cfg).unwrap();
        let back: WardenConfig = toml::from_str(&raw).unwrap();
        assert_eq!(
            back.auth.token_secret.unwrap().expose_secret(),
            &"a".repeat(32)
        );
        assert_eq!(back.webhooks["stripe"].secret.expose_secret(), "whsec");
    }
}
