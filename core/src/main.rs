//! Sales query server executable
//!
//! Loads the record store once, then serves it over both transports until
//! SIGINT or SIGTERM.

use anyhow::Context;
use colored::Colorize;
use sales_core::config::DEFAULT_CONFIG_PATH;
use sales_core::{Config, QueryEngine, SalesError, server::SalesServer};
use std::sync::Arc;
use tracing_subscriber::{filter::EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("salesd=info,sales_core=info"));
    fmt().with_env_filter(filter).init();

    print_banner();

    let config = Config::load_from_path(DEFAULT_CONFIG_PATH)?;

    println!("{}", "Starting sales server...".bright_green());
    println!("Configuration:");
    println!(
        "  Data Source: {}",
        config.data.source.display().to_string().bright_cyan()
    );
    println!("  Framed Port: {}", config.server.framed_port.to_string().bright_cyan());
    println!("  JSON-RPC Port: {}", config.server.rpc_port.to_string().bright_cyan());
    println!(
        "  Max Connections: {}",
        config.server.max_connections.to_string().bright_cyan()
    );

    // Loading failure is fatal; there is no degraded mode.
    let engine = Arc::new(QueryEngine::new());
    let loader = Arc::clone(&engine);
    let source = config.data.source.clone();
    tokio::task::spawn_blocking(move || loader.load(&source))
        .await?
        .map_err(SalesError::Ingestion)
        .with_context(|| format!("loading {}", config.data.source.display()))?;

    let server = SalesServer::bind(&config.server, engine)
        .await
        .context("binding listeners")?;

    // Set up graceful shutdown handler
    let shutdown_token = server.shutdown_token();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        println!("\n{}", "Received shutdown signal".bright_yellow());
        shutdown_token.cancel();
    });

    match server.run().await {
        Ok(()) => {
            println!("{}", "Sales server stopped".bright_green());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "Server error:".bright_red(), e);
            Err(e.into())
        }
    }
}

fn print_banner() {
    let banner = r#"
    ███████╗ █████╗ ██╗     ███████╗███████╗██████╗
    ██╔════╝██╔══██╗██║     ██╔════╝██╔════╝██╔══██╗
    ███████╗███████║██║     █████╗  ███████╗██║  ██║
    ╚════██║██╔══██║██║     ██╔══╝  ╚════██║██║  ██║
    ███████║██║  ██║███████╗███████╗███████║██████╔╝
    ╚══════╝╚═╝  ╚═╝╚══════╝╚══════╝╚══════╝╚═════╝
                 Sales Query Server v0.1.0
    "#;

    println!("{}", banner.bright_blue());
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (Ok(mut sigint), Ok(mut sigterm)) = (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) else {
            tracing::error!("Failed to install signal handlers");
            return std::future::pending().await;
        };

        tokio::select! {
            _ = sigint.recv() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    }
}
