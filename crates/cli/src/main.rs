mod client_commands;
mod config_commands;
mod db_commands;
mod key_commands;
mod user_commands;
mod webhook_commands;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    warden_gateway::services::GatewayServices,
};

#[derive(Parser)]
#[command(name = "warden", about = "Warden: dual-mode auth and API credential gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Custom config directory (overrides default ~/.config/warden/).
    #[arg(long, global = true, env = "WARDEN_CONFIG_DIR")]
    config_dir: Option<std::path::PathBuf>,
    /// Custom data directory (overrides default data dir).
    #[arg(long, global = true, env = "WARDEN_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Gateway,
    /// Issue, list and revoke API credentials in the local database.
    Keys {
        #[command(subcommand)]
        action: key_commands::KeyAction,
    },
    /// Manage the users behind browser sessions.
    Users {
        #[command(subcommand)]
        action: user_commands::UserAction,
    },
    /// Database management (migrate, clear, reset).
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
    /// Webhook helpers.
    Webhook {
        #[command(subcommand)]
        action: webhook_commands::WebhookAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Exchange an API key for a token and cache it for later commands.
    Login {
        /// Gateway base URL, e.g. http://127.0.0.1:8787.
        #[arg(long, env = "WARDEN_SERVER")]
        server: String,
        /// API key (`wk_…`).
        #[arg(long, env = "WARDEN_API_KEY", hide_env_values = true)]
        api_key: String,
    },
    /// Show who the cached credentials authenticate as.
    Whoami {
        /// Gateway base URL (defaults to the one used at login).
        #[arg(long, env = "WARDEN_SERVER")]
        server: Option<String>,
    },
    /// Remove cached credentials.
    Logout,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    // Apply directory overrides before anything reads config.
    if let Some(ref dir) = cli.config_dir {
        warden_config::set_config_dir(dir.clone());
    }
    if let Some(ref dir) = cli.data_dir {
        warden_config::set_data_dir(dir.clone());
    }

    match cli.command {
        // Default: start gateway when no subcommand is provided
        None | Some(Commands::Gateway) => {
            info!(version = env!("CARGO_PKG_VERSION"), "warden starting");
            let mut config = warden_config::discover_and_load();

            // CLI args override config values
            if let Some(bind) = cli.bind {
                config.server.bind = bind;
            }
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            warden_gateway::server::start_gateway(config, GatewayServices::noop()).await
        },
        Some(Commands::Keys { action }) => key_commands::handle_keys(action).await,
        Some(Commands::Users { action }) => user_commands::handle_users(action).await,
        Some(Commands::Db { action }) => db_commands::handle_db(action).await,
        Some(Commands::Webhook { action }) => webhook_commands::handle_webhook(action),
        Some(Commands::Config { action }) => config_commands::handle_config(action),
        Some(Commands::Login { server, api_key }) => {
            client_commands::login(&server, &api_key).await
        },
        Some(Commands::Whoami { server }) => client_commands::whoami(server.as_deref()).await,
        Some(Commands::Logout) => client_commands::logout(),
    }
}
