use super::{load_deposits, open_store};
use crate::cli::InitArgs;
use crate::config::Config;
use crate::signer::load_keys;
use crate::store::WalletStore;
use anyhow::Result;
use tracing::info;

pub async fn run(args: InitArgs, config: Config) -> Result<()> {
    let keys_path = args.keys.unwrap_or_else(|| config.files.private_keys.clone());
    let deposits_path = args
        .deposits
        .unwrap_or_else(|| config.files.deposit_addresses.clone());

    let signers = load_keys(&keys_path)?;
    let deposits = load_deposits(&deposits_path)?;
    if signers.len() != deposits.len() {
        anyhow::bail!(
            "{} private keys but {} deposit addresses",
            signers.len(),
            deposits.len()
        );
    }

    let store = open_store(&config).await?;
    let mut added = 0usize;
    for (signer, deposit) in signers.iter().zip(deposits) {
        if store.ensure_wallet(signer.address(), deposit).await? {
            added += 1;
        }
    }
    info!(added, total = signers.len(), "wallets registered");
    println!(
        "registered {added} new wallets ({} already known)",
        signers.len() - added
    );
    Ok(())
}
