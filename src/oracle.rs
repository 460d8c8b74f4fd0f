use crate::abi::{decode_address, decode_u256, decode_u256_triple, encode_claim_contract_call};
use crate::chain::ChainConnection;
use crate::encode::{
    encode_donation_quote, encode_extra_options, encode_gas_cost_query, encode_send_fee_query,
};
use crate::error::{ClaimError, Result};
use crate::types::{format_units, FeeQuote, NATIVE_DECIMALS, STABLE_DECIMALS};
use alloy_primitives::{Address, Bytes, U256};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DonationQuote {
    /// Stable-coin value with six decimals, display only.
    pub stable: U256,
    pub native_wei: U256,
}

/// Read-only pricing against the donate contract on the reference chain.
#[derive(Clone)]
pub struct FeeOracle {
    reference: ChainConnection,
}

impl FeeOracle {
    pub fn new(reference: ChainConnection) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> &ChainConnection {
        &self.reference
    }

    pub async fn quote_donation(&self, allocation: U256) -> Result<DonationQuote> {
        let raw = self
            .reference_call(encode_donation_quote(allocation))
            .await?;
        let (stable, _, native_wei) = decode_u256_triple(&raw)
            .map_err(|err| ClaimError::OracleCallFailed(err.to_string()))?;
        debug!(
            stable = %format_units(stable, STABLE_DECIMALS),
            native = %format_units(native_wei, NATIVE_DECIMALS),
            "donation quoted"
        );
        Ok(DonationQuote { stable, native_wei })
    }

    /// Extra options payload and messaging fee for delivering a claim from
    /// `target` to the reference chain. Free on the reference chain itself.
    pub async fn quote_extra_bytes(
        &self,
        target: &ChainConnection,
        wallet: Address,
        amount: U256,
    ) -> Result<(Bytes, U256)> {
        if target.name() == self.reference.name() {
            return Ok((Bytes::new(), U256::ZERO));
        }

        let raw = self
            .reference_call(encode_gas_cost_query(target.profile.endpoint_id, amount))
            .await?;
        let gas_cost = decode_u256(&raw).map_err(|err| ClaimError::OracleCallFailed(err.to_string()))?;
        let extra = encode_extra_options(gas_cost);

        let remote = target
            .rpc
            .call(target.profile.claim_contract, encode_claim_contract_call())
            .await
            .map_err(|err| ClaimError::OracleCallFailed(err.to_string()))?;
        let remote = decode_address(&remote).map_err(|err| ClaimError::OracleCallFailed(err.to_string()))?;

        let raw = target
            .rpc
            .call(remote, encode_send_fee_query(wallet, amount, &extra))
            .await
            .map_err(|err| ClaimError::OracleCallFailed(err.to_string()))?;
        let send_fee = decode_u256(&raw).map_err(|err| ClaimError::OracleCallFailed(err.to_string()))?;

        let messaging_fee = send_fee + gas_cost;
        debug!(
            chain = target.name(),
            %gas_cost,
            %send_fee,
            %messaging_fee,
            "messaging fee quoted"
        );
        Ok((extra, messaging_fee))
    }

    pub async fn quote(
        &self,
        target: &ChainConnection,
        wallet: Address,
        allocation: U256,
    ) -> Result<FeeQuote> {
        let donation = self.quote_donation(allocation).await?;
        let (extra_payload, messaging_fee) =
            self.quote_extra_bytes(target, wallet, allocation).await?;
        Ok(FeeQuote {
            messaging_fee,
            donation_required: donation.native_wei,
            extra_payload,
        })
    }

    async fn reference_call(&self, data: Bytes) -> Result<Bytes> {
        self.reference
            .rpc
            .call(self.reference.profile.fee_oracle, data)
            .await
            .map_err(|err| ClaimError::OracleCallFailed(err.to_string()))
    }
}
