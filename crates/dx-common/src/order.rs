use ethers::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    algo::{Algo, AlgoSpec},
    amount::serialize_minor_units,
    error::OrderError,
    token::{Token, TokenInfo},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTag {
    pub name: String,
    pub value: String,
}

/// Loosely-populated order input, as assembled by a template.
#[derive(Debug, Clone, Default)]
pub struct OrderDraft {
    pub token_in: Option<TokenInfo>,
    pub token_out: Option<TokenInfo>,
    pub amount_in: Decimal,
    pub algo: Option<AlgoSpec>,
    pub order_tags: Vec<OrderTag>,
}

/// Order input whose required parts are all present and whose tokens were
/// resolved through the execution service.
#[derive(Debug, Clone)]
pub struct OrderConfig {
    pub token_in: Token,
    pub token_out: Token,
    pub amount_in: Decimal,
    pub algo: AlgoSpec,
    pub order_tags: Vec<OrderTag>,
}

impl TryFrom<OrderDraft> for OrderConfig {
    type Error = OrderError;

    fn try_from(draft: OrderDraft) -> Result<Self, Self::Error> {
        let (token_in, token_out) = match (draft.token_in, draft.token_out) {
            (Some(token_in), Some(token_out)) => (token_in, token_out),
            _ => return Err(OrderError::MissingTokens),
        };
        let token_in = Token::try_from(token_in)?;
        let token_out = Token::try_from(token_out)?;

        let algo = match draft.algo {
            Some(algo) if !algo.algo_type.trim().is_empty() => algo,
            _ => return Err(OrderError::MissingAlgo),
        };

        Ok(OrderConfig {
            token_in,
            token_out,
            amount_in: draft.amount_in,
            algo,
            order_tags: draft.order_tags,
        })
    }
}

/// Validated payload handed to the execution service's prepare call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub token_in: Token,
    pub token_out: Token,
    #[serde(serialize_with = "serialize_minor_units")]
    pub amount_in: U256,
    pub algo: Algo,
    pub tags: Vec<OrderTag>,
}

/// Order handle returned by a successful prepare call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedOrder {
    pub id: String,
    #[serde(default)]
    pub quote: Value,
}

/// Raw prepare result. The service reports rejections through `error`
/// rather than a transport failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<PreparedOrder>,
}

impl PrepareResponse {
    pub fn into_order(self) -> Result<PreparedOrder, OrderError> {
        if let Some(error) = self.error {
            return Err(OrderError::Rejected(error));
        }
        self.order.ok_or_else(|| {
            OrderError::Rejected("prepare response carried neither an order nor an error".into())
        })
    }
}
