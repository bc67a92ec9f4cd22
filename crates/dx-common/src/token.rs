use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// Token metadata as reported by the execution service lookup.
///
/// Fields are optional because the lookup may be partial; use [`Token`] for
/// anything that feeds the order engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowance: Option<U256>,
}

/// A token resolved through the execution service: precision is known and
/// balance/allowance are concrete minor-unit amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub balance: U256,
    pub allowance: U256,
}

impl TryFrom<TokenInfo> for Token {
    type Error = OrderError;

    fn try_from(info: TokenInfo) -> Result<Self, Self::Error> {
        let decimals = info
            .decimals
            .ok_or_else(|| OrderError::UnresolvedToken(info.symbol.clone()))?;
        Ok(Token {
            address: info.address,
            symbol: info.symbol,
            decimals,
            balance: info.balance.unwrap_or_default(),
            allowance: info.allowance.unwrap_or_default(),
        })
    }
}
