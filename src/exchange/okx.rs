use super::auth::{ApiCredentials, HmacAuth};
use crate::chain::ChainProfile;
use crate::error::{ClaimError, Result};
use crate::types::{format_units, NATIVE_DECIMALS};
use crate::wait::{DelayRange, PollSchedule, WaitError, Waiter};
use crate::workflow::FundingSource;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const CURRENCIES_PATH: &str = "/api/v5/asset/currencies";
const WITHDRAWAL_PATH: &str = "/api/v5/asset/withdrawal";
const WITHDRAWAL_HISTORY_PATH: &str = "/api/v5/asset/withdrawal-history";
const SUBACCOUNT_LIST_PATH: &str = "/api/v5/users/subaccount/list";
const SUBACCOUNT_BALANCES_PATH: &str = "/api/v5/asset/subaccount/balances";
const TRANSFER_PATH: &str = "/api/v5/asset/transfer";

/// Funding account id on both sides of an internal transfer.
const FUNDING_ACCOUNT: &str = "6";
/// Internal transfer type: sub-account to master.
const SUB_TO_MASTER: &str = "2";
/// On-chain withdrawal destination.
const ON_CHAIN: &str = "4";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<Vec<T>> {
        if self.code != "0" {
            return Err(ClaimError::Exchange(format!(
                "api error {}: {}",
                self.code, self.msg
            )));
        }
        Ok(self.data)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyNetwork {
    pub ccy: String,
    pub chain: String,
    pub can_wd: bool,
    #[serde(default)]
    pub fee: Option<Decimal>,
    /// Deprecated name for `fee`, still sent alongside it.
    #[serde(default)]
    pub min_fee: Option<Decimal>,
    pub min_wd: Decimal,
}

impl CurrencyNetwork {
    pub fn withdraw_fee(&self) -> Result<Decimal> {
        self.fee.or(self.min_fee).ok_or_else(|| {
            ClaimError::Exchange(format!("network {} has no withdrawal fee", self.chain))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawalTicket {
    wd_id: String,
}

#[derive(Debug, Deserialize)]
struct WithdrawalState {
    state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubAccount {
    sub_acct: String,
}

#[derive(Debug, Deserialize)]
struct FundingBalance {
    ccy: String,
    bal: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawalRequest<'a> {
    ccy: &'a str,
    amt: String,
    dest: &'static str,
    to_addr: String,
    chain: &'a str,
    fee: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferRequest<'a> {
    ccy: &'a str,
    amt: String,
    from: &'static str,
    to: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    sub_acct: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweptBalance {
    pub sub_account: String,
    pub currency: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct OkxSettings {
    pub base_url: String,
    pub proxy: Option<String>,
    pub funding_asset: String,
    pub withdraw_poll: PollSchedule,
    pub withdraw_delay: DelayRange,
}

pub struct OkxClient {
    http: reqwest::Client,
    auth: HmacAuth,
    waiter: Waiter,
    settings: OkxSettings,
}

/// Amount to withdraw for a shortfall: shortfall plus the network fee rounded
/// up to six places, lifted just above the minimum when it falls below it.
/// `jitter_ppm` is the lift in parts per million, 1_001_000 to 1_030_000.
pub fn withdrawal_amount(
    shortfall_wei: U256,
    fee: Decimal,
    minimum: Decimal,
    jitter_ppm: u32,
) -> Result<Decimal> {
    let shortfall = Decimal::from_str(&format_units(shortfall_wei, NATIVE_DECIMALS))
        .map_err(|e| ClaimError::Exchange(format!("shortfall out of range: {e}")))?;
    let amount = (shortfall + fee).round_dp_with_strategy(6, RoundingStrategy::AwayFromZero);
    if amount >= minimum {
        return Ok(amount);
    }
    let lifted = minimum * Decimal::new(i64::from(jitter_ppm), 6);
    Ok(lifted.round_dp_with_strategy(6, RoundingStrategy::AwayFromZero))
}

pub fn select_network<'a>(
    networks: &'a [CurrencyNetwork],
    chain: &ChainProfile,
) -> Result<&'a CurrencyNetwork> {
    let disabled = || ClaimError::NetworkDisabledForWithdrawal {
        chain: chain.name.clone(),
    };
    let wanted = chain.okx_network.as_deref().ok_or_else(disabled)?;
    let network = networks
        .iter()
        .find(|network| network.chain == wanted)
        .ok_or_else(|| ClaimError::Exchange(format!("network {wanted} is not listed")))?;
    if !network.can_wd {
        return Err(disabled());
    }
    Ok(network)
}

impl OkxClient {
    pub fn new(credentials: ApiCredentials, waiter: Waiter, settings: OkxSettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(15));
        if let Some(proxy) = &settings.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ClaimError::Exchange(format!("invalid exchange proxy: {}", e.without_url())))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| ClaimError::Exchange(e.to_string()))?;
        Ok(Self {
            http,
            auth: HmacAuth::new(credentials),
            waiter,
            settings,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let headers = self.auth.build_headers("GET", path, None)?;
        let response = self
            .http
            .get(format!("{}{path}", self.settings.base_url))
            .headers(headers)
            .send()
            .await
            .map_err(|e| ClaimError::Exchange(e.without_url().to_string()))?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ClaimError::Exchange(e.without_url().to_string()))?;
        envelope.into_data()
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<Vec<T>> {
        let body = serde_json::to_string(body)
            .map_err(|e| ClaimError::Exchange(format!("failed to encode request: {e}")))?;
        let headers = self.auth.build_headers("POST", path, Some(&body))?;
        let response = self
            .http
            .post(format!("{}{path}", self.settings.base_url))
            .headers(headers)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ClaimError::Exchange(e.without_url().to_string()))?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ClaimError::Exchange(e.without_url().to_string()))?;
        envelope.into_data()
    }

    pub async fn currency_networks(&self, currency: &str) -> Result<Vec<CurrencyNetwork>> {
        self.get(&format!("{CURRENCIES_PATH}?ccy={currency}")).await
    }

    async fn withdraw(
        &self,
        wallet: Address,
        network: &CurrencyNetwork,
        amount: Decimal,
    ) -> Result<String> {
        let fee = network.withdraw_fee()?;
        let request = WithdrawalRequest {
            ccy: &self.settings.funding_asset,
            amt: amount.normalize().to_string(),
            dest: ON_CHAIN,
            to_addr: format!("{wallet:#x}"),
            chain: &network.chain,
            fee: fee.normalize().to_string(),
        };
        let tickets: Vec<WithdrawalTicket> = self.post(WITHDRAWAL_PATH, &request).await?;
        tickets
            .into_iter()
            .next()
            .map(|ticket| ticket.wd_id)
            .ok_or_else(|| ClaimError::Exchange("withdrawal response has no id".into()))
    }

    /// `true` once the withdrawal completed, `false` when it failed or never settled.
    async fn wait_for_withdrawal(&self, wd_id: &str) -> Result<bool> {
        let path = format!("{WITHDRAWAL_HISTORY_PATH}?wdId={wd_id}");
        let (client, path) = (self, path.as_str());
        let result = self
            .waiter
            .poll(&self.settings.withdraw_poll, move || async move {
                let states: Vec<WithdrawalState> = match client.get(path).await {
                    Ok(states) => states,
                    Err(err) => {
                        debug!(wd_id, error = %err, "withdrawal status lookup failed");
                        return Ok::<_, ClaimError>(None);
                    }
                };
                Ok(match states.first().map(|state| state.state.as_str()) {
                    Some("2") => Some(true),
                    Some("-1" | "-2" | "-3") => Some(false),
                    _ => None,
                })
            })
            .await;

        match result {
            Ok(done) => Ok(done),
            Err(WaitError::Timeout { waited }) => {
                warn!(wd_id, ?waited, "withdrawal did not settle in time");
                Ok(false)
            }
            Err(WaitError::Cancelled) => Err(ClaimError::Cancelled),
            Err(WaitError::Probe(err)) => Err(err),
        }
    }

    /// Move every funding balance of every sub-account to the master account.
    pub async fn sweep(&self) -> Result<Vec<SweptBalance>> {
        info!("sweeping sub-account balances");
        let accounts: Vec<SubAccount> = self.get(SUBACCOUNT_LIST_PATH).await?;
        let mut swept = Vec::new();
        for account in accounts {
            let balances: Vec<FundingBalance> = self
                .get(&format!("{SUBACCOUNT_BALANCES_PATH}?subAcct={}", account.sub_acct))
                .await?;
            for balance in balances.into_iter().filter(|b| b.bal > Decimal::ZERO) {
                let request = TransferRequest {
                    ccy: &balance.ccy,
                    amt: balance.bal.normalize().to_string(),
                    from: FUNDING_ACCOUNT,
                    to: FUNDING_ACCOUNT,
                    kind: SUB_TO_MASTER,
                    sub_acct: &account.sub_acct,
                };
                let _: Vec<serde_json::Value> = self.post(TRANSFER_PATH, &request).await?;
                info!(
                    sub_account = %account.sub_acct,
                    currency = %balance.ccy,
                    amount = %balance.bal,
                    "moved to master account"
                );
                swept.push(SweptBalance {
                    sub_account: account.sub_acct.clone(),
                    currency: balance.ccy,
                    amount: balance.bal,
                });
            }
        }
        Ok(swept)
    }

    async fn try_fund(&self, wallet: Address, chain: &ChainProfile, shortfall: U256) -> Result<bool> {
        let networks = self.currency_networks(&self.settings.funding_asset).await?;
        let network = select_network(&networks, chain)?;
        let jitter = rand::thread_rng().gen_range(1_001_000..=1_030_000);
        let amount = withdrawal_amount(shortfall, network.withdraw_fee()?, network.min_wd, jitter)?;

        let wd_id = self.withdraw(wallet, network, amount).await?;
        info!(
            %wallet,
            chain = %chain.name,
            network = %network.chain,
            %amount,
            currency = %self.settings.funding_asset,
            %wd_id,
            "withdrawal requested"
        );
        if !self.wait_for_withdrawal(&wd_id).await? {
            warn!(%wallet, %wd_id, "withdrawal failed");
            return Ok(false);
        }
        info!(%wallet, %wd_id, "withdrawal completed");
        self.waiter.delay(self.settings.withdraw_delay).await?;
        Ok(true)
    }
}

#[async_trait]
impl FundingSource for OkxClient {
    async fn fund(&self, wallet: Address, chain: &ChainProfile, amount: U256) -> Result<bool> {
        match self.try_fund(wallet, chain, amount).await {
            Ok(done) => Ok(done),
            Err(err @ (ClaimError::NetworkDisabledForWithdrawal { .. } | ClaimError::Cancelled)) => {
                Err(err)
            }
            Err(err) => {
                warn!(%wallet, chain = %chain.name, error = %err, "funding through exchange failed");
                Ok(false)
            }
        }
    }
}
