use ethers::types::U256;
use thiserror::Error;

use crate::engine::OrderStage;

/// Failures raised while composing an order. None of them are retried.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("must supply input and output token instances")]
    MissingTokens,
    #[error("token '{0}' has no decimal precision; use tokens looked up through the execution service")]
    UnresolvedToken(String),
    #[error("invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },
    #[error("missing algo or algo.type in order config")]
    MissingAlgo,
    #[error("unsupported algo type: {0}")]
    UnsupportedAlgoType(String),
    #[error("insufficient {symbol} balance to trade: have {balance}, need {required}")]
    InsufficientBalance {
        symbol: String,
        balance: U256,
        required: U256,
    },
    #[error(
        "insufficient {symbol} spend allowance ({allowance} < {required}) and automatic spend approval is not enabled"
    )]
    InsufficientAllowance {
        symbol: String,
        allowance: U256,
        required: U256,
    },
    #[error("spend approval for {symbol} failed: {cause:#}")]
    ApprovalFailed { symbol: String, cause: anyhow::Error },
    #[error("order preparation failed: {0:#}")]
    PrepareFailed(anyhow::Error),
    #[error("execution service rejected order: {0}")]
    Rejected(String),
}

impl OrderError {
    pub(crate) fn invalid_amount(amount: impl ToString, reason: impl Into<String>) -> Self {
        OrderError::InvalidAmount {
            amount: amount.to_string(),
            reason: reason.into(),
        }
    }

    /// Last pipeline stage reached before the failure.
    pub fn stage(&self) -> OrderStage {
        match self {
            OrderError::MissingTokens
            | OrderError::UnresolvedToken(_)
            | OrderError::InvalidAmount { .. }
            | OrderError::MissingAlgo => OrderStage::Start,
            OrderError::UnsupportedAlgoType(_) => OrderStage::ValidatedInputs,
            OrderError::InsufficientBalance { .. } => OrderStage::AlgoResolved,
            OrderError::InsufficientAllowance { .. } | OrderError::ApprovalFailed { .. } => {
                OrderStage::FundsChecked
            }
            OrderError::PrepareFailed(_) => OrderStage::Assembled,
            OrderError::Rejected(_) => OrderStage::Delegated,
        }
    }

    /// Stable label used in run artifacts.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::MissingTokens => "missing_tokens",
            OrderError::UnresolvedToken(_) => "unresolved_token",
            OrderError::InvalidAmount { .. } => "invalid_amount",
            OrderError::MissingAlgo => "missing_algo",
            OrderError::UnsupportedAlgoType(_) => "unsupported_algo_type",
            OrderError::InsufficientBalance { .. } => "insufficient_balance",
            OrderError::InsufficientAllowance { .. } => "insufficient_allowance",
            OrderError::ApprovalFailed { .. } => "approval_failed",
            OrderError::PrepareFailed(_) => "prepare_failed",
            OrderError::Rejected(_) => "rejected",
        }
    }
}

/// Problems with the process-wide driver settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("must provide an infura id or rpc endpoint for the web3 provider")]
    MissingProvider,
    #[error("must provide a wallet private key")]
    MissingWallet,
    #[error("no infura network known for chain id {0}; use an rpc endpoint instead")]
    UnsupportedInfuraChain(u64),
}
