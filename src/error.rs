use alloy_primitives::{B256, U256};
use std::time::Duration;
use thiserror::Error;

/// Failure of a single RPC round trip.
///
/// `NotFound` is kept apart from `Connection` because receipt polling treats
/// the former as "still pending" and the latter as fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcFailure {
    #[error("rpc connection failed: {0}")]
    Connection(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rpc error: {0}")]
    Response(String),

    #[error("failed to decode rpc result: {0}")]
    Decode(String),
}

impl From<alloy_transport::TransportError> for RpcFailure {
    fn from(err: alloy_transport::TransportError) -> Self {
        match &err {
            alloy_json_rpc::RpcError::Transport(_) => Self::Connection(err.to_string()),
            alloy_json_rpc::RpcError::ErrorResp(payload)
                if payload.message.to_ascii_lowercase().contains("not found") =>
            {
                Self::NotFound(payload.message.to_string())
            }
            alloy_json_rpc::RpcError::DeserError { .. } => Self::Decode(err.to_string()),
            _ => Self::Response(err.to_string()),
        }
    }
}

/// Errors raised by the claim engine and its collaborators.
#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("unknown chain: {0}")]
    UnknownChain(String),

    #[error("fee oracle call failed: {0}")]
    OracleCallFailed(String),

    #[error("gas estimation failed: {0}")]
    GasEstimationFailed(String),

    #[error("insufficient native balance, short by {shortfall} wei")]
    InsufficientNativeBalance { shortfall: U256 },

    #[error("withdrawals to {chain} are disabled on the exchange")]
    NetworkDisabledForWithdrawal { chain: String },

    #[error("transaction {tx_hash:#x} not confirmed after {waited:?}")]
    ConfirmationTimeout { tx_hash: B256, waited: Duration },

    #[error(transparent)]
    Rpc(#[from] RpcFailure),

    #[error("allocation api error: {0}")]
    Allocation(String),

    #[error("exchange error: {0}")]
    Exchange(String),

    #[error("wallet store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("signer error: {0}")]
    Signer(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ClaimError {
    /// Errors that stop the chain fallback loop instead of moving to the next chain.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownChain(_) | Self::Cancelled | Self::Store(_) | Self::ConfirmationTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ClaimError>;
