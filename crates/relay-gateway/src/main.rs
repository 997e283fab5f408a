//! relay-gateway: WhatsApp to local LLM relay
//!
//! Usage:
//!   relay-gateway                      - Broadcast the template, then serve the webhook
//!   relay-gateway --no-broadcast       - Serve the webhook only
//!   relay-gateway --contacts FILE      - Broadcast to FILE instead of the configured path
//!   relay-gateway --help               - Show help

mod error;

use std::sync::Arc;

use relay_contacts::send_bulk_from_spreadsheet;
use relay_core::{Config, LlmClient};
use relay_whatsapp::WhatsAppBot;
use tracing_subscriber::EnvFilter;

use crate::error::{GatewayError, Result};

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Broadcast (optionally) and serve
    Server(ServerOptions),
    /// Show help
    Help,
    /// Show version
    Version,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ServerOptions {
    skip_broadcast: bool,
    contacts_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = match parse_args(std::env::args().skip(1))? {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("relay-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server(options) => options,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let mut config = Config::load()?;
    if let Some(path) = options.contacts_path {
        config.broadcast.contacts_path = path;
    }
    if options.skip_broadcast {
        config.broadcast.enabled = false;
    }

    run(config).await?;
    Ok(())
}

/// Parse command line arguments
fn parse_args<I>(args: I) -> Result<RunMode>
where
    I: IntoIterator<Item = String>,
{
    let mut options = ServerOptions::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--no-broadcast" => options.skip_broadcast = true,
            "--contacts" => {
                let path = args.next().ok_or_else(|| {
                    GatewayError::Usage("--contacts needs a file path".to_string())
                })?;
                options.contacts_path = Some(path);
            }
            other => return Err(GatewayError::Usage(format!("unknown argument: {}", other))),
        }
    }

    Ok(RunMode::Server(options))
}

/// Print help message
fn print_help() {
    println!("relay-gateway - WhatsApp to local LLM relay");
    println!();
    println!("Usage:");
    println!("  relay-gateway                  Broadcast the template, then serve the webhook");
    println!("  relay-gateway --no-broadcast   Skip the startup broadcast");
    println!("  relay-gateway --contacts FILE  Contact spreadsheet (default: contacts.xlsx)");
    println!("  relay-gateway --help           Show this help message");
    println!("  relay-gateway --version        Show version");
    println!();
    println!("Environment Variables:");
    println!("  META_TOKEN           Graph API access token (required)");
    println!("  PHONE_NUMBER_ID      Sender phone-number id (required)");
    println!("  VERIFY_TOKEN         Webhook verify token (default: testtoken)");
    println!("  TEMPLATE_NAME        Broadcast template (default: hello_world)");
    println!("  TEMPLATE_LANG        Template language (default: en_US)");
    println!("  APP_SECRET           Enables X-Hub-Signature-256 checks");
    println!("  LLM_PROVIDER         llamacpp or openai (default: llamacpp)");
    println!("  LLM_BASE_URL         Model server URL");
    println!("  SERVER_PORT          Webhook port (default: 5000)");
}

/// Broadcast once, then serve until Ctrl+C
async fn run(config: Config) -> Result<()> {
    let model = LlmClient::new(&config.llm)?;
    tracing::info!(
        "[MODEL] Using {:?} completion server at {}",
        model.provider(),
        model.base_url()
    );

    let bot = WhatsAppBot::from_config(&config, Arc::new(model))?;

    if config.broadcast.enabled {
        let api = bot.api();
        let summary = send_bulk_from_spreadsheet(&*api, &config.broadcast.contacts_path).await?;
        tracing::info!(
            "Startup broadcast: {} sent, {} failed",
            summary.sent,
            summary.failed
        );
    } else {
        tracing::info!("Startup broadcast disabled");
    }

    tracing::info!("[SERVER] Starting webhook on {}", bot.addr());
    tracing::info!("Press Ctrl+C to exit");

    bot.start(shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}
