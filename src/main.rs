use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, error, info};

use codebuddy::{
    api::HttpChatApi, bus::EventBus, config::Config, interface::terminal::TerminalInterface,
    server::DevServer, ChatSessionStore,
};

#[derive(Parser)]
#[command(name = "codebuddy", version, about = "Chat with your repository")]
struct Cli {
    /// Base URL of the chat API (overrides CODEBUDDY_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat in the terminal (default)
    Chat {
        /// Session to open on startup
        #[arg(long)]
        session: Option<String>,
        /// Repository new conversations are bound to
        #[arg(long)]
        repo: Option<String>,
    },
    /// Run the in-memory development API server
    Serve {
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file before the log filter is read
    let dotenv = dotenvy::dotenv();

    // RUST_LOG wins, then CODEBUDDY_LOG, then info
    let default_level = std::env::var("CODEBUDDY_LOG").unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&default_level))
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dotenv {
        // Not fatal, env vars and flags still apply
        debug!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
        config.validate().context("Invalid --api-url")?;
    }

    match cli.command.unwrap_or(Commands::Chat {
        session: None,
        repo: None,
    }) {
        Commands::Chat { session, repo } => {
            if session.is_some() {
                config.initial_session_id = session;
            }
            if repo.is_some() {
                config.repository_id = repo;
            }
            run_chat(config).await
        }
        Commands::Serve { port } => run_server(port).await,
    }
}

async fn run_chat(config: Config) -> anyhow::Result<()> {
    info!("Connecting to chat API at {}", config.api_url);

    let api = HttpChatApi::new(&config).context("Failed to build HTTP client")?;
    let bus = Arc::new(EventBus::new());
    let store = Arc::new(ChatSessionStore::new(
        Arc::new(api),
        bus.clone(),
        config.initial_session_id.clone(),
    ));

    let terminal = TerminalInterface::new(store, bus, config.repository_id.clone());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        res = terminal.run() => {
            if let Err(e) = res {
                error!("Terminal stopped with error: {}", e);
            }
        }
    }

    Ok(())
}

async fn run_server(port: u16) -> anyhow::Result<()> {
    let app = DevServer::new().router();

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Development API listening on http://localhost:{}/api", port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        res = axum::serve(listener, app) => {
            if let Err(e) = res {
                error!("Server stopped with error: {}", e);
            }
        }
    }

    Ok(())
}
