use std::sync::Arc;

use {
    anyhow::Result,
    clap::Subcommand,
    warden_auth::{SqliteSessionStore, SystemClock},
};

#[derive(Subcommand)]
pub enum UserAction {
    /// Add a user that browser sessions can belong to.
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Open a browser session for a user and print the cookie value.
    Session {
        #[arg(long)]
        email: String,
    },
}

pub async fn handle_users(action: UserAction) -> Result<()> {
    let config = warden_config::discover_and_load();
    let pool = warden_gateway::state::connect_pool(&config).await?;
    let sessions = SqliteSessionStore::new(pool.clone(), Arc::new(SystemClock))
        .await?
        .with_cookie_name(config.auth.session_cookie.clone())
        .with_ttl(chrono::Duration::days(i64::from(config.auth.session_ttl_days)));

    let result = match action {
        UserAction::Add { email, name } => {
            let user = sessions.create_user(&email, name.as_deref()).await?;
            println!("Added user {} <{email}>", user.id);
            Ok(())
        },
        UserAction::Session { email } => open_session(&sessions, &email).await,
    };
    pool.close().await;
    result
}

async fn open_session(sessions: &SqliteSessionStore, email: &str) -> Result<()> {
    let user = sessions
        .find_user_by_email(email)
        .await?
        .ok_or_else(|| {
            anyhow::anyhow!("no user with email {email}; add one with `warden users add`")
        })?;
    let token = sessions.create_session(&user.id).await?;
    println!("Cookie: {}={token}", sessions.cookie_name());
    Ok(())
}
