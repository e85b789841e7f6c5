use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use linebot_core::channel::line::LineChannel;
use linebot_core::config::{self, Config};
use linebot_core::credentials::Credentials;
use linebot_core::secret;
use linebot_core::service::http::{self, AppState, HealthResponse};

#[derive(Parser)]
#[command(
    name = "linebot",
    about = "LINE chat bot webhook service",
    version = linebot_core::VERSION,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load credentials and serve the webhook
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show effective configuration and which credentials resolve
    Status,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Compute an X-Line-Signature for a request body
    Sign {
        /// Channel secret
        #[arg(long, env = "LINE_CHANNEL_SECRET")]
        secret: String,
        /// Body file (reads stdin when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Print the health check payload
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "linebot=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(host, port).await?,
        Commands::Status => cmd_status().await?,
        Commands::Init { force } => cmd_init(force)?,
        Commands::Sign { secret, file } => cmd_sign(&secret, file)?,
        Commands::Health => cmd_health()?,
    }

    Ok(())
}

async fn cmd_serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut cfg = config::load_config_from_env();
    if let Some(host) = host {
        cfg.gateway.host = host;
    }
    if let Some(port) = port {
        cfg.gateway.port = port;
    }

    tracing::info!(
        "Starting linebot v{} for project {}",
        linebot_core::VERSION,
        cfg.project_id
    );

    let secrets = secret::create_secret_provider(&cfg);
    let addr = cfg.listen_addr();
    let state = AppState::bootstrap(cfg, secrets.as_ref()).await;
    if !state.is_configured() {
        tracing::warn!("Serving in degraded mode: webhook requests will fail");
    }

    http::serve(&addr, Arc::new(state)).await
}

async fn cmd_status() -> Result<()> {
    let config_path = config::get_config_path();
    let cfg = config::load_config_from_env();

    println!("linebot Status\n");
    println!(
        "Config: {} {}",
        config_path.display(),
        if config_path.exists() { "✓" } else { "✗ (defaults)" }
    );
    println!("Project: {}", cfg.project_id);
    println!("Listen: {}", cfg.listen_addr());
    println!("Model: {}", cfg.completion.model);
    println!("Secrets: {:?}", cfg.secrets.backend);
    match cfg.warehouse.backend {
        config::WarehouseBackend::Bigquery => println!("Warehouse: {}", cfg.table_id()),
        config::WarehouseBackend::None => println!("Warehouse: disabled"),
    }

    let secrets = secret::create_secret_provider(&cfg);
    let creds = Credentials::bootstrap(secrets.as_ref(), &cfg.secrets).await;
    let mark = |v: &Option<String>| if v.is_some() { "✓" } else { "not set" };

    println!();
    println!(
        "LINE access token ({}): {}",
        cfg.secrets.channel_access_token,
        mark(&creds.channel_access_token)
    );
    println!(
        "LINE channel secret ({}): {}",
        cfg.secrets.channel_secret,
        mark(&creds.channel_secret)
    );
    println!(
        "Completion API key ({}): {}",
        cfg.secrets.completion_api_key,
        mark(&creds.completion_api_key)
    );

    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let path = config::get_config_path();
    if path.exists() && !force {
        println!("Config already exists at {} (use --force to overwrite)", path.display());
        return Ok(());
    }

    config::save_config(&Config::default(), Some(&path))
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("✓ Wrote default config to {}", path.display());
    Ok(())
}

fn cmd_sign(secret: &str, file: Option<PathBuf>) -> Result<()> {
    let body = match file {
        Some(path) => {
            std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    println!("{}", LineChannel::sign(secret, &body));
    Ok(())
}

fn cmd_health() -> Result<()> {
    let cfg = config::load_config_from_env();
    let health = HealthResponse::healthy(&cfg.project_id);
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}
