use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod cli;
mod mcp_server;
mod tools;
mod web;

use bgs_executor::ShellExecutor;
use bgs_supervisor::Supervisor;
use bgs_validate::CommandValidator;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // All diagnostics go to stderr; stdout carries the JSON-RPC frames.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            http_port,
            retention_seconds,
        } => serve(http_port, retention_seconds).await,
    }
}

async fn serve(http_port: Option<u16>, retention_override: Option<i64>) -> Result<()> {
    let supervisor = match retention_override {
        Some(seconds) => Supervisor::new(seconds),
        None => Supervisor::from_env(),
    };
    let executor = Arc::new(ShellExecutor::new(
        CommandValidator::from_env(),
        supervisor,
    ));

    // SIGINT/SIGTERM: the supervisor SIGTERMs every live child, then
    // re-raises so the parent sees the signal death.
    executor
        .supervisor()
        .install_signal_handlers()
        .context("failed to install termination signal handlers")?;

    let allowed = executor.validator().allowed_commands();
    if allowed.is_empty() {
        tracing::warn!(
            "allow-list is empty; every command will be rejected (set ALLOW_COMMANDS)"
        );
    } else {
        info!(commands = ?allowed, "allow-list loaded");
    }

    let shutdown = CancellationToken::new();
    let dashboard = match http_port {
        Some(port) => Some(web::start_dashboard(executor.clone(), port, shutdown.clone()).await?),
        None => None,
    };

    let result = mcp_server::run_stdio_server(executor.clone()).await;

    shutdown.cancel();
    if let Some(handle) = dashboard {
        handle.wait().await;
    }
    let cleaned = executor.cleanup_all().await;
    info!(cleaned, "server shut down");
    result
}
