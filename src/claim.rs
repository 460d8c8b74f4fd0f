use crate::abi::{decode_u256, encode_balance_of_call, encode_donate_and_claim_call};
use crate::chain::ChainConnection;
use crate::encode::encode_claimed_query;
use crate::error::{ClaimError, Result, RpcFailure};
use crate::oracle::FeeOracle;
use crate::tx::{TxBuilder, TxOutcome};
use crate::types::{format_units, ClaimProof, NATIVE_DECIMALS, TOKEN_DECIMALS};
use crate::wait::{PollSchedule, WaitError, Waiter};
use alloy_primitives::{Address, B256, U256};
use tracing::info;

/// Token balance of `wallet` on the connection's chain.
pub async fn token_balance(conn: &ChainConnection, wallet: Address) -> Result<U256> {
    let raw = conn
        .rpc
        .call(conn.profile.token, encode_balance_of_call(wallet))
        .await?;
    decode_u256(&raw).map_err(|err| RpcFailure::Decode(err.to_string()).into())
}

/// Whether the reference chain's oracle has recorded a claim for `wallet`.
pub async fn claimed_flag(reference: &ChainConnection, wallet: Address) -> Result<bool> {
    let raw = reference
        .rpc
        .call(reference.profile.fee_oracle, encode_claimed_query(wallet))
        .await?;
    let flag = decode_u256(&raw).map_err(|err| RpcFailure::Decode(err.to_string()))?;
    Ok(!flag.is_zero())
}

pub struct ClaimSettings {
    pub gas_boost: f64,
    /// Native reserve for the claim transaction itself.
    pub tx_fee_buffer: U256,
    pub token_arrival: PollSchedule,
}

pub struct ClaimOrchestrator {
    builder: TxBuilder,
    oracle: FeeOracle,
    waiter: Waiter,
    settings: ClaimSettings,
}

impl ClaimOrchestrator {
    pub fn new(builder: TxBuilder, oracle: FeeOracle, waiter: Waiter, settings: ClaimSettings) -> Self {
        Self {
            builder,
            oracle,
            waiter,
            settings,
        }
    }

    pub async fn is_claimed(&self, wallet: Address) -> Result<bool> {
        claimed_flag(self.oracle.reference(), wallet).await
    }

    pub async fn claim(&self, proof: &ClaimProof) -> Result<TxOutcome> {
        let wallet = self.builder.address();
        let target = self.builder.connection();
        let quote = self
            .oracle
            .quote(target, wallet, proof.allocation_amount)
            .await?;

        let required = quote.call_value() + self.settings.tx_fee_buffer;
        if let Some(shortfall) = self.builder.native_shortfall(required).await? {
            info!(
                %wallet,
                chain = target.name(),
                required = %format_units(required, NATIVE_DECIMALS),
                shortfall = %format_units(shortfall, NATIVE_DECIMALS),
                "not enough native balance to claim"
            );
            return Ok(TxOutcome::InsufficientBalance(shortfall));
        }

        let data = encode_donate_and_claim_call(
            quote.donation_required,
            proof.allocation_amount,
            proof.proof_entries.clone(),
            wallet,
            quote.extra_payload.clone(),
        );
        info!(
            %wallet,
            chain = target.name(),
            allocation = %format_units(proof.allocation_amount, TOKEN_DECIMALS),
            donation = %format_units(quote.donation_required, NATIVE_DECIMALS),
            messaging_fee = %format_units(quote.messaging_fee, NATIVE_DECIMALS),
            "claiming"
        );
        let tx = self
            .builder
            .build(
                Some(quote.call_value()),
                Some(data),
                Some(target.profile.claim_contract),
            )
            .await?;
        self.builder.sign(tx, self.settings.gas_boost).await
    }

    pub async fn token_balance(&self, wallet: Address) -> Result<U256> {
        token_balance(self.builder.connection(), wallet).await
    }

    /// Poll the token balance after `claim_tx` confirmed until it turns non-zero.
    pub async fn wait_for_tokens(&self, wallet: Address, claim_tx: B256) -> Result<U256> {
        let conn = self.builder.connection();
        let result = self
            .waiter
            .poll(&self.settings.token_arrival, || async move {
                let balance = token_balance(conn, wallet).await?;
                Ok::<_, ClaimError>((!balance.is_zero()).then_some(balance))
            })
            .await;

        match result {
            Ok(balance) => {
                info!(
                    %wallet,
                    chain = conn.name(),
                    balance = %format_units(balance, TOKEN_DECIMALS),
                    "tokens arrived"
                );
                Ok(balance)
            }
            Err(WaitError::Timeout { waited }) => Err(ClaimError::ConfirmationTimeout {
                tx_hash: claim_tx,
                waited,
            }),
            Err(WaitError::Cancelled) => Err(ClaimError::Cancelled),
            Err(WaitError::Probe(err)) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{donateAndClaimCall, NATIVE_DONATION};
    use crate::testutil::{token_schedule, FakeNetwork, DONATION_DIVISOR, TEST_ADDRESS};
    use alloy_sol_types::SolCall;
    use std::time::Duration;

    const BUFFER: u64 = 40_000_000_000_000;

    fn orchestrator(network: &FakeNetwork, chain: &str) -> ClaimOrchestrator {
        ClaimOrchestrator::new(
            network.builder(chain),
            FeeOracle::new(network.registry.reference().unwrap()),
            network.waiter.clone(),
            ClaimSettings {
                gas_boost: 1.5,
                tx_fee_buffer: U256::from(BUFFER),
                token_arrival: token_schedule(),
            },
        )
    }

    fn proof(allocation: U256) -> ClaimProof {
        ClaimProof {
            allocation_amount: allocation,
            proof_entries: vec![B256::repeat_byte(0x0a), B256::repeat_byte(0x0b)],
        }
    }

    #[tokio::test]
    async fn is_claimed_is_idempotent() {
        let network = FakeNetwork::new(&["arbitrum", "base"]);
        let claimer = orchestrator(&network, "base");
        assert!(!claimer.is_claimed(TEST_ADDRESS).await.unwrap());
        assert!(!claimer.is_claimed(TEST_ADDRESS).await.unwrap());
        network.chain("arbitrum").mark_claimed(TEST_ADDRESS);
        assert!(claimer.is_claimed(TEST_ADDRESS).await.unwrap());
        assert!(claimer.is_claimed(TEST_ADDRESS).await.unwrap());
    }

    #[tokio::test]
    async fn shortfall_of_one_wei_is_reported_without_sending() {
        let network = FakeNetwork::new(&["arbitrum", "base"]);
        let allocation = U256::from(8_000_000u64);
        let donation = allocation / U256::from(DONATION_DIVISOR);
        // default fake fees: gas cost 3000 + send fee 7000
        let required = donation + U256::from(10_000u64) + U256::from(BUFFER);
        network
            .chain("base")
            .set_native(TEST_ADDRESS, required - U256::from(1u64));

        let claimer = orchestrator(&network, "base");
        let outcome = claimer.claim(&proof(allocation)).await.unwrap();
        assert_eq!(outcome, TxOutcome::InsufficientBalance(U256::from(1u64)));
        assert!(network.chain("base").sent().is_empty());

        network
            .chain("base")
            .credit_native(TEST_ADDRESS, U256::from(1u64));
        let outcome = claimer.claim(&proof(allocation)).await.unwrap();
        assert!(outcome.is_confirmed());
    }

    #[tokio::test]
    async fn claim_call_carries_donation_and_fee() {
        let network = FakeNetwork::new(&["arbitrum", "base"]);
        network
            .chain("base")
            .set_native(TEST_ADDRESS, U256::from(10u64).pow(U256::from(18u64)));
        let allocation = U256::from(8_000_000u64);
        let claimer = orchestrator(&network, "base");

        let outcome = claimer.claim(&proof(allocation)).await.unwrap();
        assert!(outcome.is_confirmed());

        let sent = network.chain("base").sent();
        assert_eq!(sent.len(), 1);
        let profile = network.registry.connect("base").unwrap().profile;
        assert_eq!(sent[0].to, Some(profile.claim_contract));
        assert_eq!(sent[0].value, U256::from(2_000u64 + 10_000));

        let call = <donateAndClaimCall as SolCall>::abi_decode(&sent[0].input).unwrap();
        assert_eq!(call.currency, NATIVE_DONATION);
        assert_eq!(call.amountToDonate, U256::from(2_000u64));
        assert_eq!(call.zroAmount, allocation);
        assert_eq!(call.to, TEST_ADDRESS);
        assert_eq!(call.proof.len(), 2);
        assert_eq!(call.extraBytes.len(), 38);
    }

    #[tokio::test]
    async fn claim_on_reference_chain_sends_empty_options() {
        let network = FakeNetwork::new(&["arbitrum", "base"]);
        network
            .chain("arbitrum")
            .set_native(TEST_ADDRESS, U256::from(10u64).pow(U256::from(18u64)));
        let claimer = orchestrator(&network, "arbitrum");

        let outcome = claimer.claim(&proof(U256::from(4_000u64))).await.unwrap();
        assert!(outcome.is_confirmed());
        let sent = network.chain("arbitrum").sent();
        let call = <donateAndClaimCall as SolCall>::abi_decode(&sent[0].input).unwrap();
        assert!(call.extraBytes.is_empty());
        assert_eq!(sent[0].value, U256::from(1u64));
    }

    #[tokio::test]
    async fn waits_until_tokens_arrive() {
        let network = FakeNetwork::new(&["arbitrum", "base"]);
        let claimer = orchestrator(&network, "base");

        let chain = network.chain("base");
        let waiting = claimer.wait_for_tokens(TEST_ADDRESS, B256::ZERO);
        let crediting = async {
            chain.set_tokens(TEST_ADDRESS, U256::from(5u64));
        };
        let (balance, ()) = tokio::join!(waiting, crediting);
        assert_eq!(balance.unwrap(), U256::from(5u64));
    }

    #[tokio::test]
    async fn missing_tokens_time_out() {
        let network = FakeNetwork::new(&["arbitrum", "base"]);
        let claimer = orchestrator(&network, "base");
        let err = claimer
            .wait_for_tokens(TEST_ADDRESS, B256::repeat_byte(7))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClaimError::ConfirmationTimeout { waited, .. } if waited == Duration::from_secs(300)
        ));
    }
}
