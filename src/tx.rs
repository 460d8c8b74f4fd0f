use crate::chain::ChainConnection;
use crate::error::{ClaimError, Result, RpcFailure};
use crate::signer::SignerContext;
use crate::wait::{PollSchedule, WaitError, Waiter};
use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_network::TxSignerSync;
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_GAS_BOOST: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub value: Option<U256>,
    pub data: Option<Bytes>,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

/// How a chain's EIP-1559 fee pair is derived from the pending block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeePolicy {
    /// Suggested priority fee on top of the pending base fee.
    #[default]
    Market,
    /// Priority fee pinned to the pending base fee.
    PriorityEqualsBase,
    /// Base fee replaced by a constant, suggested priority fee kept.
    FixedBase { base_fee: u64 },
}

impl FeePolicy {
    pub fn needs_suggested_tip(&self) -> bool {
        !matches!(self, Self::PriorityEqualsBase)
    }

    /// Returns `(max_fee_per_gas, max_priority_fee_per_gas)`.
    pub fn resolve(&self, pending_base_fee: u128, suggested_tip: u128) -> (u128, u128) {
        let (base, tip) = match self {
            Self::Market => (pending_base_fee, suggested_tip),
            Self::PriorityEqualsBase => (pending_base_fee, pending_base_fee),
            Self::FixedBase { base_fee } => (u128::from(*base_fee), suggested_tip),
        };
        // never below the tip, even with a zero base fee
        let max_fee = tip.saturating_add(base).saturating_sub(1).max(tip);
        (max_fee, tip)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed(B256),
    Reverted(B256),
    /// Nothing was sent; the wallet is short by this many wei.
    InsufficientBalance(U256),
    NotSent { reason: String },
}

impl TxOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

/// Builds, signs, broadcasts and confirms transactions for one wallet on one chain.
#[derive(Clone)]
pub struct TxBuilder {
    conn: ChainConnection,
    signer: SignerContext,
    waiter: Waiter,
    schedule: PollSchedule,
}

impl TxBuilder {
    pub fn new(
        conn: ChainConnection,
        signer: SignerContext,
        waiter: Waiter,
        schedule: PollSchedule,
    ) -> Self {
        Self {
            conn,
            signer,
            waiter,
            schedule,
        }
    }

    pub fn connection(&self) -> &ChainConnection {
        &self.conn
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub async fn build(
        &self,
        value: Option<U256>,
        data: Option<Bytes>,
        to: Option<Address>,
    ) -> Result<UnsignedTransaction> {
        let from = self.address();
        let chain_id = self.conn.rpc.chain_id().await?;
        let nonce = self.conn.rpc.nonce(from).await?;
        Ok(UnsignedTransaction {
            chain_id,
            from,
            to,
            nonce,
            value: value.filter(|value| !value.is_zero()),
            data: data.filter(|data| !data.is_empty()),
            gas_limit: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
        })
    }

    pub async fn apply_fee_policy(&self, tx: &mut UnsignedTransaction) -> Result<()> {
        let policy = self.conn.profile.fee_policy;
        let base_fee = self.conn.rpc.pending_base_fee().await?;
        let suggested_tip = if policy.needs_suggested_tip() {
            self.conn.rpc.max_priority_fee().await?
        } else {
            base_fee
        };
        let (max_fee, tip) = policy.resolve(base_fee, suggested_tip);
        tx.max_fee_per_gas = Some(max_fee);
        tx.max_priority_fee_per_gas = Some(tip);
        Ok(())
    }

    pub async fn estimate_gas(&self, tx: &UnsignedTransaction) -> Result<u64> {
        self.conn
            .rpc
            .estimate_gas(tx)
            .await
            .map_err(|err| ClaimError::GasEstimationFailed(err.to_string()))
    }

    /// Shortfall against `required`, `None` when the wallet can afford it.
    pub async fn native_shortfall(&self, required: U256) -> Result<Option<U256>> {
        let balance = self.conn.rpc.native_balance(self.address()).await?;
        Ok((balance < required).then(|| required - balance))
    }

    /// Estimate, boost, price, sign, broadcast and wait for the receipt.
    ///
    /// Failures before the transaction reaches the node come back as
    /// [`TxOutcome::NotSent`]; confirmation failures are errors.
    pub async fn sign(&self, mut tx: UnsignedTransaction, gas_boost: f64) -> Result<TxOutcome> {
        let chain = self.conn.name();
        let estimate = match self.estimate_gas(&tx).await {
            Ok(estimate) => estimate,
            Err(err) => return Ok(self.not_sent(err)),
        };
        let gas_limit = boost_gas(estimate, gas_boost);
        tx.gas_limit = Some(gas_limit);

        if let Err(err) = self.apply_fee_policy(&mut tx).await {
            return Ok(self.not_sent(err));
        }
        let raw = match self.encode_signed(&tx) {
            Ok(raw) => raw,
            Err(err) => return Ok(self.not_sent(err)),
        };
        let tx_hash = match self.conn.rpc.send_raw_transaction(raw).await {
            Ok(tx_hash) => tx_hash,
            Err(err) => return Ok(self.not_sent(ClaimError::Rpc(err))),
        };

        info!(
            wallet = %tx.from,
            chain,
            nonce = tx.nonce,
            gas_estimate = estimate,
            gas_limit,
            tx = %self.conn.profile.tx_link(tx_hash),
            "transaction broadcast"
        );
        self.confirm(tx_hash).await
    }

    pub async fn confirm(&self, tx_hash: B256) -> Result<TxOutcome> {
        let rpc = self.conn.rpc.clone();
        let receipt = self
            .waiter
            .poll(&self.schedule, || {
                let rpc = rpc.clone();
                async move {
                    match rpc.receipt_status(tx_hash).await {
                        Ok(status) => Ok(status),
                        Err(RpcFailure::NotFound(_)) => Ok(None),
                        Err(err) => Err(err),
                    }
                }
            })
            .await;

        let link = self.conn.profile.tx_link(tx_hash);
        match receipt {
            Ok(true) => {
                info!(chain = self.conn.name(), tx = %link, "transaction confirmed");
                Ok(TxOutcome::Confirmed(tx_hash))
            }
            Ok(false) => {
                warn!(chain = self.conn.name(), tx = %link, "transaction reverted");
                Ok(TxOutcome::Reverted(tx_hash))
            }
            Err(WaitError::Timeout { waited }) => {
                warn!(chain = self.conn.name(), tx = %link, ?waited, "confirmation timed out");
                Err(ClaimError::ConfirmationTimeout { tx_hash, waited })
            }
            Err(WaitError::Cancelled) => Err(ClaimError::Cancelled),
            Err(WaitError::Probe(err)) => Err(ClaimError::Rpc(err)),
        }
    }

    fn encode_signed(&self, tx: &UnsignedTransaction) -> Result<Bytes> {
        let missing = |field: &str| ClaimError::Signer(format!("transaction has no {field}"));
        let mut unsigned = TxEip1559 {
            chain_id: tx.chain_id,
            nonce: tx.nonce,
            gas_limit: tx.gas_limit.ok_or_else(|| missing("gas limit"))?,
            max_fee_per_gas: tx.max_fee_per_gas.ok_or_else(|| missing("max fee"))?,
            max_priority_fee_per_gas: tx
                .max_priority_fee_per_gas
                .ok_or_else(|| missing("priority fee"))?,
            to: tx.to.map(TxKind::Call).unwrap_or(TxKind::Create),
            value: tx.value.unwrap_or_default(),
            access_list: Default::default(),
            input: tx.data.clone().unwrap_or_default(),
        };
        let signature = self
            .signer
            .inner()
            .sign_transaction_sync(&mut unsigned)
            .map_err(|err| ClaimError::Signer(err.to_string()))?;
        let envelope = TxEnvelope::from(unsigned.into_signed(signature));
        Ok(Bytes::from(envelope.encoded_2718()))
    }

    fn not_sent(&self, err: ClaimError) -> TxOutcome {
        warn!(
            wallet = %self.address(),
            chain = self.conn.name(),
            error = %err,
            "transaction not sent"
        );
        TxOutcome::NotSent {
            reason: err.to_string(),
        }
    }
}

fn boost_gas(estimate: u64, gas_boost: f64) -> u64 {
    (estimate as f64 * gas_boost) as u64
}
