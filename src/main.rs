//! Mock chat server CLI.
//!
//! Run with no arguments to listen on `0.0.0.0:9090` and log to
//! `./mock_server.log`. `--config`, `--port`, `--host` and `--log-file` are
//! optional extras, and `RUST_LOG` only tunes operational tracing on stderr.

use clap::Parser;
use mock_chat_server::api::{create_router_with_state, AppState};
use mock_chat_server::config::Config;
use mock_chat_server::logger::{format_startup_banner, DiagnosticLog};
use std::net::IpAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "mock-chat-server")]
#[command(about = "Mock chat completion server that logs what clients send")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    host: Option<IpAddr>,

    /// Diagnostic log file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Operational logs go to stderr; stdout carries the request log
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = match cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::default(),
    };
    let config = config.with_overrides(cli.host, cli.port, cli.log_file);

    run_server(config).await
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let addr = config.socket_addr();

    let log = DiagnosticLog::open(&config.logging)?;
    log.emit(&format_startup_banner(config.server.port, &config.logging.file));

    let app = create_router_with_state(AppState::new(log));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Mock server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
