use crate::cli::SweepArgs;
use crate::config::Config;
use crate::exchange;
use crate::wait::Waiter;
use anyhow::{anyhow, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SweepView {
    sub_account: String,
    currency: String,
    amount: String,
}

pub async fn run(args: SweepArgs, config: Config, waiter: Waiter) -> Result<()> {
    let client = exchange::okx_client(&config.okx, config.delays.withdraw, waiter)?.ok_or_else(|| {
        anyhow!(
            "exchange credentials missing, set {}, {} and {}",
            config.okx.api_key_env,
            config.okx.secret_env,
            config.okx.passphrase_env
        )
    })?;

    let swept = client.sweep().await?;
    let views: Vec<SweepView> = swept
        .into_iter()
        .map(|entry| SweepView {
            sub_account: entry.sub_account,
            currency: entry.currency,
            amount: entry.amount.normalize().to_string(),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }
    if views.is_empty() {
        println!("nothing to sweep");
        return Ok(());
    }
    for view in views {
        println!("{} {} {}", view.sub_account, view.amount, view.currency);
    }
    Ok(())
}
