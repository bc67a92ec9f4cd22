//! Pre-flight funds checks for the input token.
//!
//! Balance shortfalls are final. Allowance shortfalls can be repaired by a
//! single spend-increase request when automatic approval is enabled.

use ethers::types::U256;
use serde::Serialize;
use tracing::info;

use crate::{error::OrderError, service::ExecutionService, token::Token};

/// How allowance shortfalls are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalPolicy {
    pub automatic: bool,
    pub infinite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AllowanceAction {
    Sufficient,
    Approve {
        #[serde(serialize_with = "crate::amount::serialize_minor_units")]
        amount: U256,
    },
}

pub fn check_balance(token: &Token, amount: U256) -> Result<(), OrderError> {
    if token.balance < amount {
        return Err(OrderError::InsufficientBalance {
            symbol: token.symbol.clone(),
            balance: token.balance,
            required: amount,
        });
    }
    Ok(())
}

/// Decides what, if anything, must be approved before `amount` can be spent.
pub fn plan_allowance(
    token: &Token,
    amount: U256,
    policy: ApprovalPolicy,
) -> Result<AllowanceAction, OrderError> {
    if token.allowance >= amount {
        return Ok(AllowanceAction::Sufficient);
    }
    if !policy.automatic {
        return Err(OrderError::InsufficientAllowance {
            symbol: token.symbol.clone(),
            allowance: token.allowance,
            required: amount,
        });
    }
    let approve = if policy.infinite { U256::MAX } else { amount };
    Ok(AllowanceAction::Approve { amount: approve })
}

/// Runs [`plan_allowance`] and performs the approval it calls for.
pub async fn ensure_allowance<S>(
    service: &S,
    token: &Token,
    amount: U256,
    policy: ApprovalPolicy,
) -> Result<AllowanceAction, OrderError>
where
    S: ExecutionService + ?Sized,
{
    let action = plan_allowance(token, amount, policy)?;
    match action {
        AllowanceAction::Sufficient => {
            info!("single-order spend allowance good");
        }
        AllowanceAction::Approve { amount: approve } => {
            if approve == U256::MAX {
                info!("approving infinite spend on {}", token.symbol);
            } else {
                info!("approving spend allowance for {}: {}", token.symbol, approve);
            }
            service
                .increase_spending(token, approve)
                .await
                .map_err(|cause| OrderError::ApprovalFailed {
                    symbol: token.symbol.clone(),
                    cause,
                })?;
        }
    }
    Ok(action)
}
