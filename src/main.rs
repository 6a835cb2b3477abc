mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use cli::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use zecbridge::BridgeConfig;

#[tokio::main]
async fn main() {
    // Already installed is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = cli::Cli::parse();

    // Initialize tracing
    let filter = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let _ = dotenvy::dotenv(); // load .env if present
    let config = BridgeConfig::from_env();

    let cancel = shutdown_token();

    let result = match &cli.command {
        Command::Prices(args) => commands::run_prices(&config, args, cancel).await,
        Command::Balance { pubkey } => commands::run_balance(&config, pubkey).await,
        Command::Estimate(args) => commands::run_estimate(&config, args).await,
        Command::Connect { chain, address } => {
            commands::run_connect(&config, &cli.state_dir, *chain, address).await
        }
        Command::Status => commands::run_status(&config, &cli.state_dir).await,
        Command::Disconnect => commands::run_disconnect(&config, &cli.state_dir).await,
        Command::Bridge(args) => {
            info!(token = %args.token, amount = %args.amount, "bridge starting");
            commands::run_bridge(&config, &cli.state_dir, args, cancel).await
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

/// Token cancelled on the first SIGINT or SIGTERM.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        let signal = next_signal().await;
        info!(signal, "shutting down");
        token.cancel();
    });
    cancel
}

#[cfg(unix)]
async fn next_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = term.recv() => "SIGTERM",
        },
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable, listening for SIGINT only");
            let _ = tokio::signal::ctrl_c().await;
            "SIGINT"
        }
    }
}

#[cfg(not(unix))]
async fn next_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}
