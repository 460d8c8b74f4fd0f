use crate::config::Config;
use crate::error::ClaimError;
use crate::rpc::{ChainRpc, RpcClient};
use crate::tx::FeePolicy;
use crate::types::parse_address;
use alloy_primitives::{Address, B256};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Static description of one chain the claimer works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainProfile {
    pub name: String,
    /// Messaging-protocol endpoint id, not the EVM chain id.
    pub endpoint_id: u32,
    pub rpc_endpoint: String,
    pub claim_contract: Address,
    pub fee_oracle: Address,
    pub token: Address,
    pub explorer: String,
    pub fee_policy: FeePolicy,
    pub okx_network: Option<String>,
}

impl ChainProfile {
    pub fn tx_link(&self, tx_hash: B256) -> String {
        format!("{}/{tx_hash:#x}", self.explorer.trim_end_matches('/'))
    }
}

#[derive(Clone)]
pub struct ChainConnection {
    pub profile: Arc<ChainProfile>,
    pub rpc: Arc<dyn ChainRpc>,
}

impl ChainConnection {
    pub fn name(&self) -> &str {
        &self.profile.name
    }
}

/// Every configured chain with a live RPC handle, created once per run.
#[derive(Clone)]
pub struct ChainRegistry {
    reference: String,
    claim_order: Vec<String>,
    chains: BTreeMap<String, ChainConnection>,
}

impl ChainRegistry {
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config.token_address()?;
        let fee_oracle = config.fee_oracle_address()?;

        let mut chains = Vec::with_capacity(config.chains.len());
        for (name, chain) in &config.chains {
            let profile = ChainProfile {
                name: name.clone(),
                endpoint_id: chain.eid,
                rpc_endpoint: chain.rpc.clone(),
                claim_contract: parse_address(&chain.claim_contract)
                    .with_context(|| format!("invalid claim contract for {name}"))?,
                fee_oracle,
                token,
                explorer: chain.explorer.clone(),
                fee_policy: chain.fee_policy,
                okx_network: chain.okx_network.clone(),
            };
            let rpc = RpcClient::new(&chain.rpc)?;
            chains.push((profile, Arc::new(rpc) as Arc<dyn ChainRpc>));
        }

        Ok(Self::from_parts(
            &config.reference_chain,
            config.claim_chains.clone(),
            chains,
        ))
    }

    pub fn from_parts(
        reference: &str,
        claim_order: Vec<String>,
        chains: Vec<(ChainProfile, Arc<dyn ChainRpc>)>,
    ) -> Self {
        let chains = chains
            .into_iter()
            .map(|(profile, rpc)| {
                (
                    profile.name.clone(),
                    ChainConnection {
                        profile: Arc::new(profile),
                        rpc,
                    },
                )
            })
            .collect();
        Self {
            reference: reference.to_string(),
            claim_order,
            chains,
        }
    }

    pub fn connect(&self, name: &str) -> Result<ChainConnection, ClaimError> {
        self.chains
            .get(name)
            .cloned()
            .ok_or_else(|| ClaimError::UnknownChain(name.to_string()))
    }

    /// Connection to the chain hosting the donate contract.
    pub fn reference(&self) -> Result<ChainConnection, ClaimError> {
        self.connect(&self.reference)
    }

    pub fn reference_name(&self) -> &str {
        &self.reference
    }

    /// Chains eligible for claiming, in configured order.
    pub fn claim_chains(&self) -> &[String] {
        &self.claim_order
    }

    pub fn all(&self) -> impl Iterator<Item = &ChainConnection> {
        self.chains.values()
    }
}
