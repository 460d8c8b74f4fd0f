use crate::commands;
use crate::config::Config;
use crate::types::ClaimStatus;
use crate::wait::Waiter;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "zro-claimer",
    version,
    about = "Claim the ZRO airdrop across chains and forward it to deposit addresses"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub async fn run(self, config: Config, waiter: Waiter) -> Result<()> {
        match self.command {
            Command::Init(args) => commands::init::run(args, config).await,
            Command::Run(args) => commands::run::run(args, config, waiter).await,
            Command::Status(args) => commands::status::run(args, config).await,
            Command::Check(args) => commands::check::run(args, config).await,
            Command::Quote(args) => commands::quote::run(args, config).await,
            Command::Chains(args) => commands::chains::run(args, config).await,
            Command::Sweep(args) => commands::sweep::run(args, config, waiter).await,
            Command::Config(cmd) => cmd.run(config),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register key and deposit address pairs in the wallet store.
    Init(InitArgs),
    /// Process every wallet that has not succeeded yet.
    Run(RunArgs),
    /// Show stored wallet records.
    Status(StatusArgs),
    /// Show claimed flag and token balances per wallet.
    Check(CheckArgs),
    /// Quote the native value a claim would need on one chain.
    Quote(QuoteArgs),
    /// List configured chains.
    Chains(ChainsArgs),
    /// Move exchange sub-account balances to the master account.
    Sweep(SweepArgs),
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Write the built-in defaults to the config path.
    Init(ConfigInitArgs),
}

impl ConfigCommand {
    pub fn run(self, config: Config) -> Result<()> {
        match self.command {
            ConfigSubcommand::Init(args) => commands::config_init::run(args, config),
        }
    }
}

#[derive(Args, Debug)]
pub struct InitArgs {
    #[arg(long)]
    pub keys: Option<PathBuf>,

    #[arg(long)]
    pub deposits: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Skip the exchange sweep after the run even when enabled in config.
    #[arg(long)]
    pub no_sweep: bool,

    /// Keep the configured claim chain order instead of shuffling per wallet.
    #[arg(long)]
    pub no_shuffle: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(long)]
    pub status: Option<ClaimStatus>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(long)]
    pub keys: Option<PathBuf>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct QuoteArgs {
    #[arg(long)]
    pub chain: String,

    /// Allocation in whole tokens, e.g. `125.5`.
    #[arg(long)]
    pub allocation: String,

    #[arg(long)]
    pub wallet: Option<String>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ChainsArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}
