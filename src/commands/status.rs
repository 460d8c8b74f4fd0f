use super::open_store;
use crate::cli::StatusArgs;
use crate::config::Config;
use crate::store::WalletStore;
use crate::types::{format_units, WalletRecord, TOKEN_DECIMALS};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordView {
    wallet: String,
    deposit: String,
    allocation: String,
    claimed: bool,
    status: String,
}

impl From<&WalletRecord> for RecordView {
    fn from(record: &WalletRecord) -> Self {
        Self {
            wallet: format!("{:#x}", record.wallet_address),
            deposit: format!("{:#x}", record.deposit_address),
            allocation: format_units(record.allocation_amount, TOKEN_DECIMALS),
            claimed: record.claimed,
            status: record.claim_status.to_string(),
        }
    }
}

pub async fn run(args: StatusArgs, config: Config) -> Result<()> {
    let store = open_store(&config).await?;
    let records = match args.status {
        Some(status) => store.by_status(status).await?,
        None => store.all().await?,
    };
    let views: Vec<RecordView> = records.iter().map(RecordView::from).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    if views.is_empty() {
        println!("no wallets recorded");
        return Ok(());
    }

    println!(
        "{:<42} {:<42} {:>14} {:<8} {}",
        "wallet", "deposit", "allocation", "claimed", "status"
    );
    for view in &views {
        println!(
            "{:<42} {:<42} {:>14} {:<8} {}",
            view.wallet, view.deposit, view.allocation, view.claimed, view.status
        );
    }

    let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
    for view in &views {
        *totals.entry(view.status.as_str()).or_default() += 1;
    }
    let summary: Vec<String> = totals
        .iter()
        .map(|(status, count)| format!("{status}={count}"))
        .collect();
    println!("{}", summary.join(" "));
    Ok(())
}
