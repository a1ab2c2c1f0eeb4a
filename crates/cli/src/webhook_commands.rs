use std::path::PathBuf;

use {anyhow::Result, clap::Subcommand, secrecy::ExposeSecret, warden_config::WardenConfig};

#[derive(Subcommand)]
pub enum WebhookAction {
    /// Print the signature header value for a payload, as a source would send it.
    Sign {
        /// Configured webhook source (e.g. "github").
        #[arg(long)]
        source: String,
        /// File holding the exact request body.
        file: PathBuf,
    },
}

pub fn handle_webhook(action: WebhookAction) -> Result<()> {
    match action {
        WebhookAction::Sign { source, file } => {
            let config = warden_config::discover_and_load();
            let body = std::fs::read(&file)?;
            println!("{}", sign_for_source(&config, &source, &body)?);
            Ok(())
        },
    }
}

fn sign_for_source(config: &WardenConfig, source: &str, body: &[u8]) -> Result<String> {
    let Some(source_config) = config.webhooks.get(source) else {
        let mut known: Vec<&str> = config.webhooks.keys().map(String::as_str).collect();
        known.sort_unstable();
        anyhow::bail!(
            "unknown webhook source '{source}' (configured: {})",
            if known.is_empty() {
                "none".to_string()
            } else {
                known.join(", ")
            }
        );
    };
    let secret = source_config.secret.expose_secret();
    if secret.is_empty() {
        anyhow::bail!("webhooks.{source}.secret is empty");
    }
    Ok(warden_auth::webhook::sign(body, secret.as_bytes())?)
}
