use crate::tx::{FeePolicy, DEFAULT_GAS_BOOST};
use crate::types::{parse_address, parse_u256, DEFAULT_FEE_ORACLE, DEFAULT_TOKEN};
use crate::wait::{DelayRange, PollSchedule};
use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Chain hosting the donate contract every claim is priced against.
    pub reference_chain: String,
    pub token: String,
    pub fee_oracle: String,
    /// Chains a claim may be attempted on, in no particular order.
    pub claim_chains: Vec<String>,
    pub chains: BTreeMap<String, ChainConfig>,
    pub claim: ClaimConfig,
    pub confirmation: PollConfig,
    pub token_arrival: PollConfig,
    pub delays: DelayConfig,
    pub files: FileConfig,
    pub api: ApiConfig,
    pub okx: OkxConfig,
    #[serde(skip)]
    pub path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let mut chains = BTreeMap::new();
        chains.insert(
            "arbitrum".to_string(),
            ChainConfig {
                rpc: "https://arb1.arbitrum.io/rpc".to_string(),
                eid: 30110,
                claim_contract: "0xB09F16F625B363875e39ADa56C03682088471523".to_string(),
                explorer: "https://arbiscan.io/tx".to_string(),
                okx_network: Some("ETH-Arbitrum One".to_string()),
                fee_policy: FeePolicy::PriorityEqualsBase,
            },
        );
        chains.insert(
            "base".to_string(),
            ChainConfig {
                rpc: "https://mainnet.base.org".to_string(),
                eid: 30184,
                claim_contract: "0xf19ccb20726Eab44754A59eFC4Ad331e3bF4F248".to_string(),
                explorer: "https://basescan.org/tx".to_string(),
                okx_network: Some("ETH-Base".to_string()),
                fee_policy: FeePolicy::Market,
            },
        );
        chains.insert(
            "optimism".to_string(),
            ChainConfig {
                rpc: "https://mainnet.optimism.io".to_string(),
                eid: 30111,
                claim_contract: "0x3Ef4abDb646976c096DF532377EFdfE0E6391ac3".to_string(),
                explorer: "https://optimistic.etherscan.io/tx".to_string(),
                okx_network: Some("ETH-Optimism".to_string()),
                fee_policy: FeePolicy::Market,
            },
        );

        Self {
            reference_chain: "arbitrum".to_string(),
            token: format!("{DEFAULT_TOKEN:#x}"),
            fee_oracle: format!("{DEFAULT_FEE_ORACLE:#x}"),
            claim_chains: vec![
                "arbitrum".to_string(),
                "base".to_string(),
                "optimism".to_string(),
            ],
            chains,
            claim: ClaimConfig::default(),
            confirmation: PollConfig {
                settle_secs: 10,
                poll_secs: 10,
                timeout_secs: 1200,
            },
            token_arrival: PollConfig {
                settle_secs: 0,
                poll_secs: 30,
                timeout_secs: 600,
            },
            delays: DelayConfig::default(),
            files: FileConfig::default(),
            api: ApiConfig::default(),
            okx: OkxConfig::default(),
            path: PathBuf::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ChainConfig {
    pub rpc: String,
    /// Messaging-protocol endpoint id of the chain.
    pub eid: u32,
    pub claim_contract: String,
    pub explorer: String,
    /// Network label used by the exchange for withdrawals to this chain.
    pub okx_network: Option<String>,
    #[serde(default)]
    pub fee_policy: FeePolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ClaimConfig {
    pub gas_boost: f64,
    /// Native amount reserved for the claim transaction fee, in wei.
    pub tx_fee_buffer_wei: String,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            gas_boost: DEFAULT_GAS_BOOST,
            tx_fee_buffer_wei: "40000000000000".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy)]
pub struct PollConfig {
    pub settle_secs: u64,
    pub poll_secs: u64,
    pub timeout_secs: u64,
}

impl PollConfig {
    pub fn schedule(&self) -> PollSchedule {
        PollSchedule {
            settle: Duration::from_secs(self.settle_secs),
            interval: Duration::from_secs(self.poll_secs),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
#[serde(default)]
pub struct DelayConfig {
    pub claim: DelayRange,
    pub account: DelayRange,
    pub withdraw: DelayRange,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            claim: DelayRange::secs(20, 40),
            account: DelayRange::secs(60, 120),
            withdraw: DelayRange::secs(30, 60),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FileConfig {
    pub private_keys: PathBuf,
    pub deposit_addresses: PathBuf,
    pub proxies: PathBuf,
    pub database: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            private_keys: PathBuf::from("data/private_keys.txt"),
            deposit_addresses: PathBuf::from("data/deposit_addresses.txt"),
            proxies: PathBuf::from("data/proxies.txt"),
            database: PathBuf::from("claims.db"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.layerzero.foundation/api".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct OkxConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub secret_env: String,
    pub passphrase_env: String,
    /// Optional proxy for exchange traffic.
    pub proxy: Option<String>,
    /// Currency withdrawn to cover gas shortfalls.
    pub funding_asset: String,
    pub withdraw_poll: PollConfig,
    pub sweep_after_run: bool,
}

impl Default for OkxConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.okx.com".to_string(),
            api_key_env: "OKX_API_KEY".to_string(),
            secret_env: "OKX_API_SECRET".to_string(),
            passphrase_env: "OKX_API_PASSPHRASE".to_string(),
            proxy: None,
            funding_asset: "ETH".to_string(),
            withdraw_poll: PollConfig {
                settle_secs: 15,
                poll_secs: 30,
                timeout_secs: 1800,
            },
            sweep_after_run: true,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path(),
        };

        if !path.exists() {
            let mut config = Self::default();
            config.path = path;
            return Ok(config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.path = path;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = if self.path.as_os_str().is_empty() {
            default_config_path()
        } else {
            self.path.clone()
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(&self)?;
        fs::write(&path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.chains.contains_key(&self.reference_chain) {
            anyhow::bail!(
                "reference chain {} is not configured under [chains]",
                self.reference_chain
            );
        }
        for name in &self.claim_chains {
            if !self.chains.contains_key(name) {
                anyhow::bail!("claim chain {name} is not configured under [chains]");
            }
        }
        if !(self.claim.gas_boost.is_finite() && self.claim.gas_boost >= 1.0) {
            anyhow::bail!("claim.gas_boost must be a finite number of at least 1.0");
        }
        for (section, poll) in [
            ("confirmation", &self.confirmation),
            ("token_arrival", &self.token_arrival),
            ("okx.withdraw_poll", &self.okx.withdraw_poll),
        ] {
            if poll.poll_secs == 0 {
                anyhow::bail!("{section}.poll_secs must be greater than zero");
            }
        }
        self.token_address()?;
        self.fee_oracle_address()?;
        self.tx_fee_buffer()?;
        Ok(())
    }

    pub fn chain(&self, name: &str) -> Option<&ChainConfig> {
        self.chains.get(name)
    }

    pub fn token_address(&self) -> Result<Address> {
        parse_address(&self.token).context("invalid token address")
    }

    pub fn fee_oracle_address(&self) -> Result<Address> {
        parse_address(&self.fee_oracle).context("invalid fee oracle address")
    }

    pub fn tx_fee_buffer(&self) -> Result<U256> {
        parse_u256(&self.claim.tx_fee_buffer_wei).context("invalid claim.tx_fee_buffer_wei")
    }
}

fn default_config_path() -> PathBuf {
    if let Some(dir) = dirs::config_dir() {
        return dir.join("zro-claimer").join("config.toml");
    }
    PathBuf::from("./config.toml")
}
