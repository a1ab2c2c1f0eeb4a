use std::sync::Arc;

use {
    anyhow::Result,
    chrono::{DateTime, Duration, Utc},
    clap::Subcommand,
    secrecy::ExposeSecret,
    warden_auth::{Credential, CredentialIssuer, SqliteCredentialStore, SystemClock},
};

#[derive(Subcommand)]
pub enum KeyAction {
    /// Issue a new API key. The plaintext is printed once and never stored.
    Create {
        /// Principal id that will own the key.
        #[arg(long)]
        owner: String,
        /// Human-readable label (defaults to "CLI Access").
        #[arg(long, default_value = "")]
        label: String,
        /// Expire the key after this many days.
        #[arg(long)]
        ttl_days: Option<i64>,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List an owner's keys (never shows plaintext).
    List {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        json: bool,
    },
    /// Revoke one of an owner's keys.
    Revoke {
        #[arg(long)]
        owner: String,
        /// Credential id.
        #[arg(long)]
        id: String,
    },
    /// Permanently delete every key an owner has, revoked or not.
    Purge {
        #[arg(long)]
        owner: String,
        /// Skip the confirmation guard.
        #[arg(long)]
        yes: bool,
    },
}

pub async fn handle_keys(action: KeyAction) -> Result<()> {
    let config = warden_config::discover_and_load();
    let pool = warden_gateway::state::connect_pool(&config).await?;
    let store = Arc::new(SqliteCredentialStore::new(pool.clone()).await?);
    let issuer = CredentialIssuer::new(store.clone(), Arc::new(SystemClock));

    let result = match action {
        KeyAction::Create {
            owner,
            label,
            ttl_days,
            json,
        } => create(&issuer, &owner, &label, ttl_days, json).await,
        KeyAction::List { owner, json } => list(&issuer, &owner, json).await,
        KeyAction::Revoke { owner, id } => revoke(&issuer, &owner, &id).await,
        KeyAction::Purge { owner, yes } => purge(&store, &owner, yes).await,
    };
    pool.close().await;
    result
}

async fn create(
    issuer: &CredentialIssuer,
    owner: &str,
    label: &str,
    ttl_days: Option<i64>,
    json: bool,
) -> Result<()> {
    let ttl = ttl_days
        .map(|days| {
            Duration::try_days(days).ok_or_else(|| anyhow::anyhow!("--ttl-days is out of range"))
        })
        .transpose()?;
    let issued = issuer.issue(owner, label, ttl).await?;
    let credential = &issued.credential;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "plaintext": issued.plaintext.expose_secret(),
                "id": credential.id,
                "displayPrefix": credential.display_prefix,
                "expiresAt": credential.expires_at,
            }))?
        );
        return Ok(());
    }

    println!("Created key {} ({})", credential.id, credential.label);
    println!("Expires:  {}", format_time(credential.expires_at));
    println!();
    println!("  {}", issued.plaintext.expose_secret());
    println!();
    println!("Copy it now: it cannot be shown again.");
    Ok(())
}

async fn revoke(issuer: &CredentialIssuer, owner: &str, id: &str) -> Result<()> {
    let credential = issuer.revoke(owner, id).await?;
    println!(
        "Revoked {} ({}, {})",
        credential.id, credential.display_prefix, credential.label
    );
    Ok(())
}

async fn purge(store: &SqliteCredentialStore, owner: &str, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!(
            "purge deletes {owner}'s keys for good; pass --yes to confirm (or use `revoke`)"
        );
    }
    let removed = store.purge_owner(owner).await?;
    println!("Deleted {removed} key(s) owned by {owner}.");
    Ok(())
}

async fn list(issuer: &CredentialIssuer, owner: &str, json: bool) -> Result<()> {
    let keys = issuer.list(owner).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&keys)?);
        return Ok(());
    }
    if keys.is_empty() {
        println!("No keys for {owner}.");
        return Ok(());
    }
    for key in &keys {
        println!("{}", format_row(key));
    }
    Ok(())
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "never".into(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

fn format_row(key: &Credential) -> String {
    let status = if !key.active {
        "revoked"
    } else if key.is_expired_at(Utc::now()) {
        "expired"
    } else {
        "active"
    };
    format!(
        "  {:<36}  {:<12}…  {:<8}  used {:<16}  expires {:<16}  {}",
        key.id,
        key.display_prefix,
        status,
        format_time(key.last_used_at),
        format_time(key.expires_at),
        key.label,
    )
}
