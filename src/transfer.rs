use crate::abi::encode_transfer_call;
use crate::claim::token_balance;
use crate::error::Result;
use crate::tx::{TxBuilder, TxOutcome};
use crate::types::{format_units, NATIVE_DECIMALS, TOKEN_DECIMALS};
use alloy_primitives::{Address, U256};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub amount: U256,
    pub outcome: TxOutcome,
}

/// Sends the whole token balance of the builder's wallet to one destination.
pub struct TransferOrchestrator {
    builder: TxBuilder,
    gas_boost: f64,
}

impl TransferOrchestrator {
    pub fn new(builder: TxBuilder, gas_boost: f64) -> Self {
        Self { builder, gas_boost }
    }

    pub async fn transfer(&self, destination: Address) -> Result<TransferReport> {
        let conn = self.builder.connection();
        let wallet = self.builder.address();
        let amount = token_balance(conn, wallet).await?;
        if amount.is_zero() {
            warn!(%wallet, chain = conn.name(), "nothing to transfer");
            return Ok(TransferReport {
                amount,
                outcome: TxOutcome::NotSent {
                    reason: "token balance is zero".to_string(),
                },
            });
        }

        let data = encode_transfer_call(destination, amount);
        let tx = self
            .builder
            .build(None, Some(data), Some(conn.profile.token))
            .await?;
        let estimate = match self.builder.estimate_gas(&tx).await {
            Ok(estimate) => estimate,
            Err(err) => {
                warn!(%wallet, chain = conn.name(), error = %err, "transfer not sent");
                return Ok(TransferReport {
                    amount,
                    outcome: TxOutcome::NotSent {
                        reason: err.to_string(),
                    },
                });
            }
        };

        let gas_price = conn.rpc.gas_price().await?;
        let required = U256::from(gas_price) * U256::from(estimate);
        if let Some(shortfall) = self.builder.native_shortfall(required).await? {
            info!(
                %wallet,
                chain = conn.name(),
                shortfall = %format_units(shortfall, NATIVE_DECIMALS),
                "not enough native balance to transfer"
            );
            return Ok(TransferReport {
                amount,
                outcome: TxOutcome::InsufficientBalance(shortfall),
            });
        }

        info!(
            %wallet,
            chain = conn.name(),
            %destination,
            amount = %format_units(amount, TOKEN_DECIMALS),
            "transferring tokens"
        );
        let outcome = self.builder.sign(tx, self.gas_boost).await?;
        Ok(TransferReport { amount, outcome })
    }
}
