use anyhow::Result;
use async_trait::async_trait;
use ethers::types::U256;
use serde_json::Value;

use crate::{
    order::{OrderRequest, PrepareResponse, PreparedOrder},
    token::{Token, TokenInfo},
};

/// Remote collaborator that prices, approves and submits orders.
///
/// Calls are awaited one at a time by the order engine; implementations own
/// their own timeouts.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Resolves a token identifier (address or symbol) for the trading wallet.
    async fn lookup_token(&self, identifier: &str) -> Result<TokenInfo>;

    /// Raises the spender allowance for `token` to `amount` and waits until
    /// the change is confirmed.
    async fn increase_spending(&self, token: &Token, amount: U256) -> Result<()>;

    async fn prepare_order(&self, request: OrderRequest) -> Result<PrepareResponse>;

    async fn submit_order(&self, order: &PreparedOrder) -> Result<Value>;
}
