pub mod auth;
pub mod okx;

use crate::chain::ChainProfile;
use crate::config::OkxConfig;
use crate::error::Result;
use crate::wait::{DelayRange, Waiter};
use crate::workflow::FundingSource;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use auth::ApiCredentials;
use okx::{OkxClient, OkxSettings};
use std::sync::Arc;
use tracing::warn;

/// Stand-in when no exchange credentials are configured.
pub struct DisabledFunding;

#[async_trait]
impl FundingSource for DisabledFunding {
    async fn fund(&self, wallet: Address, chain: &ChainProfile, _amount: U256) -> Result<bool> {
        warn!(%wallet, chain = %chain.name, "no exchange credentials, cannot fund wallet");
        Ok(false)
    }
}

/// `None` when the credential variables are unset.
pub fn okx_client(
    config: &OkxConfig,
    withdraw_delay: DelayRange,
    waiter: Waiter,
) -> Result<Option<OkxClient>> {
    let Some(credentials) =
        ApiCredentials::from_env(&config.api_key_env, &config.secret_env, &config.passphrase_env)
    else {
        return Ok(None);
    };
    let settings = OkxSettings {
        base_url: config.base_url.trim_end_matches('/').to_string(),
        proxy: config.proxy.clone(),
        funding_asset: config.funding_asset.clone(),
        withdraw_poll: config.withdraw_poll.schedule(),
        withdraw_delay,
    };
    OkxClient::new(credentials, waiter, settings).map(Some)
}

pub fn funding_source(client: Option<Arc<OkxClient>>) -> Arc<dyn FundingSource> {
    match client {
        Some(client) => client as Arc<dyn FundingSource>,
        None => Arc::new(DisabledFunding),
    }
}
