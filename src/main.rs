mod abi;
mod allocation;
mod chain;
mod claim;
mod cli;
mod commands;
mod config;
mod encode;
mod error;
mod exchange;
mod oracle;
mod rpc;
mod signer;
mod store;
#[cfg(test)]
mod testutil;
mod transfer;
mod tx;
mod types;
mod wait;
mod workflow;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging() -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily("logs", "zro-claimer.log"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .compact(),
        )
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logging();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing current step");
            let _ = shutdown_tx.send(true);
        }
    });

    let cli = cli::Cli::parse();
    let config = config::Config::load(cli.config_path.as_deref())?;
    cli.run(config, wait::Waiter::tokio(shutdown_rx)).await
}
