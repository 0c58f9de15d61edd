//! `jive-mcp` entry point: loads configuration, builds the shared
//! dispatcher/session manager, and runs one or more transports (spec
//! §4.1). Grounded on the teacher's `main.rs` CLI shape (`clap::Parser`,
//! `tracing_subscriber` JSON/compact layering), generalized from the
//! teacher's stdio/HTTP choice to this spec's stdio/HTTP/WebSocket set
//! (WebSocket rides the same HTTP router, so the CLI only needs to pick
//! between "stdio", "http", or "both").

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jive_mcp::config::Config;
use jive_mcp::transport::{http, stdio, AppState};
use jive_mcp::{build_dispatcher, embedding};

#[derive(Parser, Debug)]
#[command(name = "jive-mcp")]
#[command(about = "MCP server exposing hierarchical work-item management tools")]
#[command(version)]
struct Cli {
    /// Which transport(s) to run.
    #[arg(long, default_value = "stdio", env = "JIVE_TRANSPORT")]
    transport: Transport,

    /// HTTP bind host (overrides `JIVE_SERVER_HOST`).
    #[arg(long, env = "JIVE_SERVER_HOST")]
    host: Option<String>,

    /// HTTP bind port (overrides `JIVE_SERVER_PORT`).
    #[arg(long, env = "JIVE_SERVER_PORT")]
    port: Option<u16>,

    /// Storage root (overrides `JIVE_DATABASE_DATA_PATH`).
    #[arg(long, env = "JIVE_DATABASE_DATA_PATH")]
    data_path: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "JIVE_SERVER_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON instead of compact text.
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum Transport {
    /// Newline-delimited JSON-RPC over stdin/stdout only.
    #[default]
    Stdio,
    /// HTTP (including the `/ws` and `/mcp` WebSocket upgrades) only.
    Http,
    /// Stdio and HTTP concurrently.
    Both,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = tracing_subscriber::registry().with(filter);

    // Stdio must never share stdout with log output (spec §4.1); route
    // all diagnostics to stderr regardless of which transport is active.
    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    let mut config = Config::from_env()?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(data_path) = cli.data_path {
        config.data_path = data_path;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?cli.transport,
        data_path = %config.data_path.display(),
        "starting jive-mcp"
    );

    let embedding_model = config.embedding_model.clone();
    let (dispatcher, sessions) = build_dispatcher(config)?;
    embedding::prewarm(&embedding_model);

    match cli.transport {
        Transport::Stdio => {
            tracing::info!("running stdio transport");
            stdio::run_stdio(dispatcher, sessions).await?;
        }
        Transport::Http => {
            tracing::info!("running http transport");
            let config = dispatcher.config.clone();
            let state = Arc::new(AppState::new(dispatcher, sessions));
            http::run_http(state, &config).await?;
        }
        Transport::Both => {
            let config = dispatcher.config.clone();
            let state = Arc::new(AppState::new(Arc::clone(&dispatcher), Arc::clone(&sessions)));
            tracing::info!("running stdio and http transports concurrently");
            let http_task = tokio::spawn(async move { http::run_http(state, &config).await });
            let stdio_task = tokio::spawn(async move { stdio::run_stdio(dispatcher, sessions).await });
            let (http_result, stdio_result) = tokio::try_join!(http_task, stdio_task)?;
            http_result?;
            stdio_result?;
        }
    }

    Ok(())
}
