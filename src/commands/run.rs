use super::{load_deposits, open_store};
use crate::allocation::{load_proxies, HttpAllocationSource};
use crate::chain::ChainRegistry;
use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::ClaimError;
use crate::exchange;
use crate::signer::{load_keys, SignerContext};
use crate::store::WalletStore;
use crate::types::{format_units, ClaimStatus, WalletRecord, TOKEN_DECIMALS};
use crate::wait::{DelayRange, Waiter};
use crate::workflow::{Workflow, WorkflowSettings};
use alloy_primitives::{Address, U256};
use anyhow::Result;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const PAUSE_AFTER_FAILURE: Duration = Duration::from_secs(2);

pub struct WalletJob {
    pub signer: SignerContext,
    pub deposit: Address,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub skipped: usize,
    pub outcomes: Vec<(Address, ClaimStatus)>,
    /// Sum of allocations seen for processed wallets.
    pub total_allocation: U256,
    pub interrupted: bool,
}

impl RunSummary {
    fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for (_, status) in &self.outcomes {
            *counts.entry(status.as_str()).or_default() += 1;
        }
        counts
    }
}

pub struct RunOptions {
    pub shuffle: bool,
    pub account_delay: DelayRange,
}

/// Process each job in order, skipping wallets already marked as succeeded.
pub async fn process_wallets(
    workflow: &Workflow,
    store: &dyn WalletStore,
    waiter: &Waiter,
    jobs: &[WalletJob],
    claim_chains: &[String],
    options: &RunOptions,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    for (index, job) in jobs.iter().enumerate() {
        let wallet = job.signer.address();
        let record = store.get(wallet).await?;
        if record.as_ref().map(|r| r.claim_status) == Some(ClaimStatus::Success) {
            summary.skipped += 1;
            continue;
        }
        if record.is_none() {
            store.upsert(&WalletRecord::pending(wallet, job.deposit)).await?;
        }

        let mut order = claim_chains.to_vec();
        if options.shuffle {
            order.shuffle(&mut rand::thread_rng());
        }
        info!(%wallet, wallet_index = index + 1, total = jobs.len(), chains = ?order, "processing wallet");

        let outcome = match workflow.process(&job.signer, job.deposit, &order).await {
            Ok(outcome) => outcome,
            Err(ClaimError::Cancelled) => {
                warn!(%wallet, "shutdown requested, stopping run");
                summary.interrupted = true;
                break;
            }
            Err(err) => return Err(err.into()),
        };
        summary.outcomes.push((wallet, outcome.status));
        summary.total_allocation += outcome.allocation;

        if index + 1 == jobs.len() {
            break;
        }
        let pause = if outcome.status == ClaimStatus::Success {
            waiter.delay(options.account_delay).await
        } else {
            waiter.sleep(PAUSE_AFTER_FAILURE).await
        };
        if pause.is_err() {
            warn!("shutdown requested, stopping run");
            summary.interrupted = true;
            break;
        }
    }
    Ok(summary)
}

pub async fn run(args: RunArgs, config: Config, waiter: Waiter) -> Result<()> {
    let signers = load_keys(&config.files.private_keys)?;
    let deposits = load_deposits(&config.files.deposit_addresses)?;
    if signers.len() != deposits.len() {
        anyhow::bail!(
            "{} private keys but {} deposit addresses",
            signers.len(),
            deposits.len()
        );
    }
    let jobs: Vec<WalletJob> = signers
        .into_iter()
        .zip(deposits)
        .map(|(signer, deposit)| WalletJob { signer, deposit })
        .collect();

    let registry = ChainRegistry::from_config(&config)?;
    let claim_chains = registry.claim_chains().to_vec();
    let store = Arc::new(open_store(&config).await?);
    let proxies = load_proxies(&config.files.proxies)?;
    info!(proxies = proxies.len(), wallets = jobs.len(), "starting run");
    let allocations = Arc::new(HttpAllocationSource::new(
        &config.api.base_url,
        proxies,
        Duration::from_secs(config.api.timeout_secs),
    ));

    let okx = exchange::okx_client(&config.okx, config.delays.withdraw, waiter.clone())?.map(Arc::new);
    if okx.is_none() {
        warn!("exchange credentials not set, wallets short on gas will not be funded");
    }
    let settings = WorkflowSettings {
        gas_boost: config.claim.gas_boost,
        tx_fee_buffer: config.tx_fee_buffer()?,
        confirmation: config.confirmation.schedule(),
        token_arrival: config.token_arrival.schedule(),
        claim_delay: config.delays.claim,
    };
    let workflow = Workflow::new(
        registry,
        allocations,
        exchange::funding_source(okx.clone()),
        store.clone(),
        waiter.clone(),
        settings,
    );

    let options = RunOptions {
        shuffle: !args.no_shuffle,
        account_delay: config.delays.account,
    };
    let started = waiter.now();
    let summary =
        process_wallets(&workflow, store.as_ref(), &waiter, &jobs, &claim_chains, &options).await?;
    info!(
        elapsed = ?(waiter.now() - started),
        allocation = %format_units(summary.total_allocation, TOKEN_DECIMALS),
        "run finished"
    );

    let counts: Vec<String> = summary
        .counts()
        .iter()
        .map(|(status, count)| format!("{status}={count}"))
        .collect();
    println!(
        "processed {} wallets, skipped {} already succeeded: {}",
        summary.outcomes.len(),
        summary.skipped,
        counts.join(" ")
    );
    if summary.interrupted {
        println!("run interrupted before all wallets were processed");
        return Ok(());
    }

    if config.okx.sweep_after_run && !args.no_sweep {
        if let Some(okx) = okx {
            match okx.sweep().await {
                Ok(swept) => info!(transfers = swept.len(), "sub-account sweep finished"),
                Err(err) => error!(error = %err, "sub-account sweep failed"),
            }
        }
    }
    Ok(())
}
