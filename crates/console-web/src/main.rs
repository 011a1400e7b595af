//! Web console server binary

use clap::Parser;
use console_web::{run_server, WebConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "console-web")]
#[command(about = "Authenticated API for the object-storage web console")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "CONSOLE_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "9001", env = "CONSOLE_PORT")]
    port: u16,

    /// Directory holding credentials.json
    #[arg(long, default_value = ".console", env = "CONSOLE_CONFIG_DIR")]
    config_dir: PathBuf,

    /// Token lifetime in seconds
    #[arg(long, default_value = "36000", env = "CONSOLE_TOKEN_EXPIRY")]
    token_expiry: u64,

    /// Storage quota in bytes (defaults to the host disk)
    #[arg(long, env = "CONSOLE_STORAGE_QUOTA")]
    storage_quota: Option<u64>,

    /// Access key to install at startup
    #[arg(long, env = "CONSOLE_ACCESS_KEY")]
    access_key: Option<String>,

    /// Secret key to install at startup
    #[arg(long, env = "CONSOLE_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Disable CORS headers
    #[arg(long, env = "CONSOLE_NO_CORS")]
    no_cors: bool,

    /// Enable debug logging
    #[arg(short, long, env = "CONSOLE_DEBUG")]
    debug: bool,

    /// Log as JSON lines
    #[arg(long, env = "CONSOLE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("console_web={},tower_http=debug", log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting web console on {}:{}", args.host, args.port);

    let config = WebConfig {
        host: args.host,
        port: args.port,
        config_dir: args.config_dir,
        token_expiry_secs: args.token_expiry,
        storage_quota: args.storage_quota,
        cors_enabled: !args.no_cors,
        access_key: args.access_key,
        secret_key: args.secret_key,
        ..Default::default()
    };

    run_server(config).await
}
