//! Client-side commands that talk to a running gateway.
//!
//! `login` exchanges an API key for a token and caches both in
//! `<config_dir>/credentials.json` (mode 0600). Later commands reuse the
//! token until it is about to expire, then exchange the key again.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use {
    anyhow::{Context, Result},
    chrono::{DateTime, Duration, Utc},
    reqwest::StatusCode,
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tracing::debug,
    warden_auth::{Principal, secret::has_credential_format},
};

const CREDENTIALS_FILE: &str = "credentials.json";

/// Tokens this close to expiry are exchanged again before use.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedCredentials {
    server: String,
    api_key: String,
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedCredentials {
    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) <= now
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeResponse {
    token: String,
    expires_in_seconds: i64,
    principal: Principal,
}

// ── Cache file ───────────────────────────────────────────────────────────────

fn credentials_path() -> Result<PathBuf> {
    warden_config::config_dir()
        .map(|dir| dir.join(CREDENTIALS_FILE))
        .context("could not determine the config directory")
}

fn load_from(path: &Path) -> Result<Option<CachedCredentials>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw).with_context(|| {
            format!("{} is corrupt; run `warden logout`", path.display())
        })?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn save_to(path: &Path, credentials: &CachedCredentials) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(credentials)?;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(json.as_bytes())?;

    // `mode` only applies on creation.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    debug!(path = %path.display(), "cached credentials");
    Ok(())
}

fn remove_at(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

// ── Target resolution ────────────────────────────────────────────────────────

fn normalize_server(server: &str) -> String {
    server.trim().trim_end_matches('/').to_string()
}

/// Which server and key to use. `WARDEN_API_KEY` beats the cached key, an
/// explicit server beats the cached one.
fn resolve_target(
    cached: Option<&CachedCredentials>,
    server: Option<&str>,
    env_key: Option<&str>,
) -> Result<(String, String)> {
    let server = server
        .map(normalize_server)
        .or_else(|| cached.map(|c| c.server.clone()))
        .context("no server known; run `warden login --server <url> --api-key <key>`")?;
    let api_key = env_key
        .map(str::to_string)
        .or_else(|| cached.map(|c| c.api_key.clone()))
        .context("not logged in; run `warden login` or set WARDEN_API_KEY")?;
    Ok((server, api_key))
}

/// The cached token, if it was minted for this server and key and is
/// not about to expire.
fn reusable(
    cached: Option<CachedCredentials>,
    server: &str,
    api_key: &str,
    now: DateTime<Utc>,
) -> Option<CachedCredentials> {
    cached.filter(|c| c.server == server && c.api_key == api_key && !c.needs_refresh(now))
}

// ── HTTP ─────────────────────────────────────────────────────────────────────

async fn error_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.json::<Value>().await {
        Ok(body) => match body.get("error").and_then(Value::as_str) {
            Some(message) => format!("{status}: {message}"),
            None => status.to_string(),
        },
        Err(_) => status.to_string(),
    }
}

async fn exchange(
    http: &reqwest::Client,
    server: &str,
    api_key: &str,
) -> Result<(CachedCredentials, Principal)> {
    let resp = http
        .post(format!("{server}/api/cli/auth/exchange"))
        .json(&serde_json::json!({ "apiKey": api_key }))
        .send()
        .await
        .with_context(|| format!("could not reach {server}"))?;
    if !resp.status().is_success() {
        anyhow::bail!("key exchange failed ({})", error_message(resp).await);
    }
    let body: ExchangeResponse = resp.json().await.context("unexpected exchange response")?;
    let expires_at = Duration::try_seconds(body.expires_in_seconds)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .context("server returned an out-of-range token lifetime")?;
    let credentials = CachedCredentials {
        server: server.to_string(),
        api_key: api_key.to_string(),
        token: body.token,
        expires_at,
    };
    Ok((credentials, body.principal))
}

async fn fetch_me(http: &reqwest::Client, server: &str, token: &str) -> Result<reqwest::Response> {
    http.get(format!("{server}/api/v1/user/me"))
        .bearer_auth(token)
        .send()
        .await
        .with_context(|| format!("could not reach {server}"))
}

fn describe(principal: &Principal) -> String {
    match (&principal.email, &principal.name) {
        (Some(email), Some(name)) => format!("{name} <{email}>"),
        (Some(email), None) => email.clone(),
        _ => principal.id.clone(),
    }
}

// ── Commands ─────────────────────────────────────────────────────────────────

pub async fn login(server: &str, api_key: &str) -> Result<()> {
    let api_key = api_key.trim();
    if !has_credential_format(api_key) {
        anyhow::bail!("that does not look like a warden API key (expected wk_…)");
    }
    let server = normalize_server(server);
    let http = reqwest::Client::new();

    let (credentials, principal) = exchange(&http, &server, api_key).await?;
    let path = credentials_path()?;
    save_to(&path, &credentials)?;

    println!("Logged in to {server} as {}", describe(&principal));
    println!("Credentials saved to {}", path.display());
    Ok(())
}

pub async fn whoami(server: Option<&str>) -> Result<()> {
    let path = credentials_path()?;
    let cached = load_from(&path)?;
    let env_key = std::env::var("WARDEN_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());
    let (server, api_key) = resolve_target(cached.as_ref(), server, env_key.as_deref())?;
    let http = reqwest::Client::new();

    let mut credentials = match reusable(cached, &server, &api_key, Utc::now()) {
        Some(credentials) => credentials,
        None => {
            debug!("exchanging API key for a fresh token");
            let (credentials, _) = exchange(&http, &server, &api_key).await?;
            save_to(&path, &credentials)?;
            credentials
        },
    };

    let mut resp = fetch_me(&http, &server, &credentials.token).await?;
    if resp.status() == StatusCode::UNAUTHORIZED {
        // Token rejected early (e.g. the server rotated its signing secret).
        let (fresh, _) = exchange(&http, &server, &api_key).await?;
        save_to(&path, &fresh)?;
        credentials = fresh;
        resp = fetch_me(&http, &server, &credentials.token).await?;
    }
    if !resp.status().is_success() {
        anyhow::bail!("whoami failed ({})", error_message(resp).await);
    }

    let me: Value = resp.json().await?;
    let field = |key: &str| me.get(key).and_then(Value::as_str).unwrap_or("-").to_string();
    println!("Server:      {server}");
    println!("User id:     {}", field("id"));
    println!("Email:       {}", field("email"));
    println!("Name:        {}", field("name"));
    println!("Auth method: {}", field("authMethod"));
    println!(
        "Token until: {}",
        credentials.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}

pub fn logout() -> Result<()> {
    let path = credentials_path()?;
    if remove_at(&path)? {
        println!("Removed {}", path.display());
    } else {
        println!("Not logged in.");
    }
    Ok(())
}
