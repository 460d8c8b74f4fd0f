use crate::chain::ChainRegistry;
use crate::claim::{claimed_flag, token_balance};
use crate::cli::CheckArgs;
use crate::config::Config;
use crate::signer::load_keys;
use crate::types::{format_units, TOKEN_DECIMALS};
use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WalletCheck {
    wallet: String,
    claimed: bool,
    balances: BTreeMap<String, String>,
}

pub async fn run(args: CheckArgs, config: Config) -> Result<()> {
    let keys_path = args.keys.unwrap_or_else(|| config.files.private_keys.clone());
    let signers = load_keys(&keys_path)?;
    let registry = ChainRegistry::from_config(&config)?;
    let reference = registry.reference()?;
    let chains: Vec<_> = registry
        .claim_chains()
        .iter()
        .map(|name| registry.connect(name))
        .collect::<Result<_, _>>()?;

    let mut checks = Vec::with_capacity(signers.len());
    for signer in &signers {
        let wallet = signer.address();
        let claimed = claimed_flag(&reference, wallet)
            .await
            .with_context(|| format!("failed to read claimed flag for {wallet}"))?;
        let lookups = chains.iter().map(|conn| token_balance(conn, wallet));
        let mut balances = BTreeMap::new();
        for (conn, balance) in chains.iter().zip(join_all(lookups).await) {
            let shown = match balance {
                Ok(amount) => format_units(amount, TOKEN_DECIMALS),
                Err(err) => format!("error: {err}"),
            };
            balances.insert(conn.name().to_string(), shown);
        }
        checks.push(WalletCheck {
            wallet: format!("{wallet:#x}"),
            claimed,
            balances,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&checks)?);
        return Ok(());
    }

    for check in checks {
        let balances: Vec<String> = check
            .balances
            .iter()
            .map(|(chain, amount)| format!("{chain}={amount}"))
            .collect();
        println!(
            "{} claimed={} {}",
            check.wallet,
            check.claimed,
            balances.join(" ")
        );
    }
    Ok(())
}
