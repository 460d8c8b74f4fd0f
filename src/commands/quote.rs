use crate::chain::ChainRegistry;
use crate::cli::QuoteArgs;
use crate::config::Config;
use crate::oracle::FeeOracle;
use crate::types::{format_hex, format_units, parse_address, parse_decimal_amount, NATIVE_DECIMALS, TOKEN_DECIMALS};
use alloy_primitives::Address;
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteView {
    chain: String,
    allocation: String,
    donation: String,
    messaging_fee: String,
    total: String,
    extra_options: String,
}

pub async fn run(args: QuoteArgs, config: Config) -> Result<()> {
    let registry = ChainRegistry::from_config(&config)?;
    let target = registry.connect(&args.chain)?;
    let oracle = FeeOracle::new(registry.reference()?);
    let allocation = parse_decimal_amount(&args.allocation, TOKEN_DECIMALS)?;
    let wallet = match args.wallet.as_deref() {
        Some(raw) => parse_address(raw)?,
        None => Address::ZERO,
    };

    let quote = oracle.quote(&target, wallet, allocation).await?;
    let view = QuoteView {
        chain: target.name().to_string(),
        allocation: format_units(allocation, TOKEN_DECIMALS),
        donation: format_units(quote.donation_required, NATIVE_DECIMALS),
        messaging_fee: format_units(quote.messaging_fee, NATIVE_DECIMALS),
        total: format_units(quote.call_value(), NATIVE_DECIMALS),
        extra_options: format_hex(&quote.extra_payload),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("chain: {}", view.chain);
    println!("allocation: {}", view.allocation);
    println!("donation: {}", view.donation);
    println!("messagingFee: {}", view.messaging_fee);
    println!("value: {}", view.total);
    println!("extraOptions: {}", view.extra_options);
    Ok(())
}
