use crate::chain::{ChainConnection, ChainProfile, ChainRegistry};
use crate::claim::{token_balance, ClaimOrchestrator, ClaimSettings};
use crate::error::{ClaimError, Result};
use crate::oracle::FeeOracle;
use crate::signer::SignerContext;
use crate::store::WalletStore;
use crate::transfer::TransferOrchestrator;
use crate::tx::{TxBuilder, TxOutcome};
use crate::types::{format_units, ClaimProof, ClaimStatus, WalletRecord, NATIVE_DECIMALS, TOKEN_DECIMALS};
use crate::wait::{DelayRange, PollSchedule, Waiter};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where allocations and merkle proofs come from.
#[async_trait]
pub trait AllocationSource: Send + Sync {
    /// `None` when the source had no usable answer for the wallet.
    async fn allocation(&self, wallet: Address) -> Result<Option<U256>>;

    async fn proof(&self, wallet: Address) -> Result<ClaimProof>;
}

/// Tops up a wallet's native balance on a chain.
#[async_trait]
pub trait FundingSource: Send + Sync {
    /// Returns whether the funds arrived. Fails with
    /// [`ClaimError::NetworkDisabledForWithdrawal`] when the chain cannot be funded.
    async fn fund(&self, wallet: Address, chain: &ChainProfile, amount: U256) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub gas_boost: f64,
    pub tx_fee_buffer: U256,
    pub confirmation: PollSchedule,
    pub token_arrival: PollSchedule,
    pub claim_delay: DelayRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletOutcome {
    pub status: ClaimStatus,
    pub allocation: U256,
}

enum ChainStep {
    Done(ClaimStatus),
    Next,
}

/// Drives one wallet at a time from pending to a terminal status.
pub struct Workflow {
    registry: ChainRegistry,
    allocations: Arc<dyn AllocationSource>,
    funding: Arc<dyn FundingSource>,
    store: Arc<dyn WalletStore>,
    waiter: Waiter,
    settings: WorkflowSettings,
}

impl Workflow {
    pub fn new(
        registry: ChainRegistry,
        allocations: Arc<dyn AllocationSource>,
        funding: Arc<dyn FundingSource>,
        store: Arc<dyn WalletStore>,
        waiter: Waiter,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            registry,
            allocations,
            funding,
            store,
            waiter,
            settings,
        }
    }

    /// Process one wallet. `chain_order` is the order claims are attempted in;
    /// callers shuffle it. Only `Cancelled` and store failures surface as errors.
    pub async fn process(
        &self,
        signer: &SignerContext,
        deposit: Address,
        chain_order: &[String],
    ) -> Result<WalletOutcome> {
        let wallet = signer.address();

        if let Some((conn, found)) = self.search_balance(wallet).await? {
            info!(
                %wallet,
                chain = conn.name(),
                amount = %format_units(found, TOKEN_DECIMALS),
                "tokens already on chain, skipping claim"
            );
            self.waiter.delay(self.settings.claim_delay).await?;
            let status = match self.transfer_funded(&conn, signer, deposit).await {
                Ok(true) => ClaimStatus::Success,
                Ok(false) => ClaimStatus::Error,
                Err(ClaimError::Cancelled) => return Err(ClaimError::Cancelled),
                Err(err) => {
                    error!(%wallet, chain = conn.name(), error = %err, "transfer failed");
                    ClaimStatus::Error
                }
            };
            return self.finish(wallet, deposit, status, found).await;
        }

        let reference = self.registry.reference()?;
        let mut allocation = U256::ZERO;
        for name in chain_order {
            let step = self
                .try_chain(name, signer, deposit, &reference, &mut allocation)
                .await;
            match step {
                Ok(ChainStep::Done(status)) => {
                    return self.finish(wallet, deposit, status, allocation).await
                }
                Ok(ChainStep::Next) => {}
                Err(err @ (ClaimError::Cancelled | ClaimError::Store(_))) => return Err(err),
                Err(err) if err.is_fatal() => {
                    error!(%wallet, chain = %name, error = %err, "giving up on wallet");
                    return self
                        .finish(wallet, deposit, ClaimStatus::Error, allocation)
                        .await;
                }
                Err(err) => {
                    warn!(%wallet, chain = %name, error = %err, "claim attempt failed, trying next chain");
                }
            }
        }

        self.finish(wallet, deposit, ClaimStatus::Error, allocation)
            .await
    }

    async fn try_chain(
        &self,
        name: &str,
        signer: &SignerContext,
        deposit: Address,
        reference: &ChainConnection,
        allocation: &mut U256,
    ) -> Result<ChainStep> {
        let wallet = signer.address();
        let conn = self.registry.connect(name)?;
        let claimer = ClaimOrchestrator::new(
            self.builder(&conn, signer),
            FeeOracle::new(reference.clone()),
            self.waiter.clone(),
            ClaimSettings {
                gas_boost: self.settings.gas_boost,
                tx_fee_buffer: self.settings.tx_fee_buffer,
                token_arrival: self.settings.token_arrival,
            },
        );

        if claimer.is_claimed(wallet).await? {
            info!(%wallet, "airdrop already claimed");
            return Ok(ChainStep::Done(ClaimStatus::AlreadyClaimed));
        }

        info!(%wallet, chain = name, "checking allocation");
        let Some(amount) = self.allocations.allocation(wallet).await? else {
            warn!(%wallet, chain = name, "allocation unavailable");
            return Ok(ChainStep::Next);
        };
        *allocation = amount;
        if amount.is_zero() {
            info!(%wallet, "wallet has no allocation");
            return Ok(ChainStep::Done(ClaimStatus::WithoutAllocation));
        }
        info!(
            %wallet,
            chain = name,
            allocation = %format_units(amount, TOKEN_DECIMALS),
            "allocation found"
        );

        let proof = self.allocations.proof(wallet).await?;
        let outcome = {
            let (claimer, proof) = (&claimer, &proof);
            self.funded(wallet, &conn.profile, move || claimer.claim(proof))
                .await?
        };
        let claim_tx = match outcome {
            TxOutcome::Confirmed(tx_hash) => tx_hash,
            other => {
                warn!(%wallet, chain = name, outcome = ?other, "claim did not go through");
                return Ok(ChainStep::Next);
            }
        };

        claimer.wait_for_tokens(wallet, claim_tx).await?;
        self.waiter.delay(self.settings.claim_delay).await?;

        // once the claim has landed no other chain can be tried
        let status = match self.transfer_funded(&conn, signer, deposit).await {
            Ok(true) => ClaimStatus::Success,
            Ok(false) => ClaimStatus::Error,
            Err(ClaimError::Cancelled) => return Err(ClaimError::Cancelled),
            Err(err) => {
                error!(%wallet, chain = name, error = %err, "transfer after claim failed");
                ClaimStatus::Error
            }
        };
        Ok(ChainStep::Done(status))
    }

    async fn transfer_funded(
        &self,
        conn: &ChainConnection,
        signer: &SignerContext,
        deposit: Address,
    ) -> Result<bool> {
        let transfer = TransferOrchestrator::new(self.builder(conn, signer), self.settings.gas_boost);
        let transfer = &transfer;
        let outcome = self
            .funded(signer.address(), &conn.profile, move || async move {
                transfer.transfer(deposit).await.map(|report| report.outcome)
            })
            .await?;
        if !outcome.is_confirmed() {
            warn!(wallet = %signer.address(), chain = conn.name(), outcome = ?outcome, "transfer did not go through");
        }
        Ok(outcome.is_confirmed())
    }

    /// Run `attempt`; on a balance shortfall fund exactly the missing amount
    /// and run it once more.
    async fn funded<F, Fut>(&self, wallet: Address, chain: &ChainProfile, mut attempt: F) -> Result<TxOutcome>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<TxOutcome>>,
    {
        let shortfall = match attempt().await? {
            TxOutcome::InsufficientBalance(shortfall) => shortfall,
            outcome => return Ok(outcome),
        };

        info!(
            %wallet,
            chain = %chain.name,
            amount = %format_units(shortfall, NATIVE_DECIMALS),
            "requesting funding"
        );
        if !self.funding.fund(wallet, chain, shortfall).await? {
            warn!(%wallet, chain = %chain.name, "funding failed");
            return Err(ClaimError::InsufficientNativeBalance { shortfall });
        }
        info!(%wallet, chain = %chain.name, "funding arrived, retrying");

        match attempt().await? {
            TxOutcome::InsufficientBalance(shortfall) => {
                Err(ClaimError::InsufficientNativeBalance { shortfall })
            }
            outcome => Ok(outcome),
        }
    }

    /// First configured chain holding a non-zero token balance.
    async fn search_balance(&self, wallet: Address) -> Result<Option<(ChainConnection, U256)>> {
        let conns: Vec<ChainConnection> = self.registry.all().cloned().collect();
        let balances = join_all(conns.iter().map(|conn| token_balance(conn, wallet))).await;

        for (conn, balance) in conns.into_iter().zip(balances) {
            match balance {
                Ok(balance) if !balance.is_zero() => return Ok(Some((conn, balance))),
                Ok(_) => {}
                Err(err) => warn!(%wallet, chain = conn.name(), error = %err, "balance lookup failed"),
            }
        }
        Ok(None)
    }

    fn builder(&self, conn: &ChainConnection, signer: &SignerContext) -> TxBuilder {
        TxBuilder::new(
            conn.clone(),
            signer.clone(),
            self.waiter.clone(),
            self.settings.confirmation,
        )
    }

    async fn finish(
        &self,
        wallet: Address,
        deposit: Address,
        status: ClaimStatus,
        allocation: U256,
    ) -> Result<WalletOutcome> {
        debug_assert!(status.is_terminal());
        let record = WalletRecord {
            wallet_address: wallet,
            deposit_address: deposit,
            allocation_amount: allocation,
            claimed: status != ClaimStatus::Error,
            claim_status: status,
        };
        self.store.upsert(&record).await?;
        match status {
            ClaimStatus::Error => error!(%wallet, %status, "wallet finished"),
            _ => info!(
                %wallet,
                %status,
                allocation = %format_units(allocation, TOKEN_DECIMALS),
                "wallet finished"
            ),
        }
        Ok(WalletOutcome { status, allocation })
    }
}
