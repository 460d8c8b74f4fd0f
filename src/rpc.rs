use crate::error::RpcFailure;
use crate::tx::UnsignedTransaction;
use alloy_network::ReceiptResponse;
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::{BlockNumberOrTag, TransactionInput, TransactionRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;

/// The slice of the JSON-RPC surface the claim engine relies on.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> Result<u64, RpcFailure>;

    async fn nonce(&self, address: Address) -> Result<u64, RpcFailure>;

    async fn native_balance(&self, address: Address) -> Result<U256, RpcFailure>;

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcFailure>;

    async fn estimate_gas(&self, tx: &UnsignedTransaction) -> Result<u64, RpcFailure>;

    /// Base fee of the pending block.
    async fn pending_base_fee(&self) -> Result<u128, RpcFailure>;

    async fn max_priority_fee(&self) -> Result<u128, RpcFailure>;

    async fn gas_price(&self) -> Result<u128, RpcFailure>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, RpcFailure>;

    /// `None` while the receipt is absent, otherwise the status flag.
    async fn receipt_status(&self, tx_hash: B256) -> Result<Option<bool>, RpcFailure>;
}

#[derive(Clone)]
pub struct RpcClient {
    provider: RootProvider,
}

impl RpcClient {
    pub fn new(url: &str) -> Result<Self> {
        let parsed = url
            .parse()
            .with_context(|| format!("invalid rpc url {url}"))?;
        let provider = RootProvider::new_http(parsed);
        Ok(Self { provider })
    }
}

fn to_request(tx: &UnsignedTransaction) -> TransactionRequest {
    TransactionRequest {
        from: Some(tx.from),
        to: tx.to.map(TxKind::Call),
        value: tx.value,
        input: tx
            .data
            .clone()
            .map(TransactionInput::new)
            .unwrap_or_default(),
        nonce: Some(tx.nonce),
        chain_id: Some(tx.chain_id),
        ..Default::default()
    }
}

#[async_trait]
impl ChainRpc for RpcClient {
    async fn chain_id(&self) -> Result<u64, RpcFailure> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn nonce(&self, address: Address) -> Result<u64, RpcFailure> {
        Ok(self.provider.get_transaction_count(address).await?)
    }

    async fn native_balance(&self, address: Address) -> Result<U256, RpcFailure> {
        Ok(self.provider.get_balance(address).await?)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcFailure> {
        let request = TransactionRequest {
            to: Some(TxKind::Call(to)),
            input: TransactionInput::new(data),
            ..Default::default()
        };
        Ok(self.provider.call(request).await?)
    }

    async fn estimate_gas(&self, tx: &UnsignedTransaction) -> Result<u64, RpcFailure> {
        Ok(self.provider.estimate_gas(to_request(tx)).await?)
    }

    async fn pending_base_fee(&self) -> Result<u128, RpcFailure> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Pending)
            .await?
            .ok_or_else(|| RpcFailure::NotFound("pending block".to_string()))?;
        let base_fee = block
            .header
            .base_fee_per_gas
            .ok_or_else(|| RpcFailure::Decode("pending block has no base fee".to_string()))?;
        Ok(u128::from(base_fee))
    }

    async fn max_priority_fee(&self) -> Result<u128, RpcFailure> {
        Ok(self.provider.get_max_priority_fee_per_gas().await?)
    }

    async fn gas_price(&self) -> Result<u128, RpcFailure> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, RpcFailure> {
        let pending = self.provider.send_raw_transaction(raw.as_ref()).await?;
        Ok(*pending.tx_hash())
    }

    async fn receipt_status(&self, tx_hash: B256) -> Result<Option<bool>, RpcFailure> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(|receipt| receipt.status()))
    }
}
