use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dx_common::{
    amount::{normalize_amount, to_human},
    time::timestamp_ms,
    ExecutionService, OrderRequest, PrepareResponse, PreparedOrder, Token, TokenInfo,
};
use ethers::types::{Address, U256};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// In-process execution service for `--demo` runs. Token state lives in
/// memory and quotes come from a fixed price table.
pub struct DemoExecutionService {
    tokens: Mutex<HashMap<Address, TokenInfo>>,
    prepared: Mutex<HashSet<String>>,
}

impl DemoExecutionService {
    pub fn new(tokens: Vec<TokenInfo>) -> Self {
        Self {
            tokens: Mutex::new(
                tokens
                    .into_iter()
                    .map(|token| (token.address, token))
                    .collect(),
            ),
            prepared: Mutex::new(HashSet::new()),
        }
    }

    /// Wallet holding 5 WETH with no allowance, plus DAI as the output side.
    pub fn seeded() -> Result<Self> {
        Ok(Self::new(vec![
            TokenInfo {
                address: Address::from_str("0xd0A1E359811322d97991E03f863a0C30C2cF029C")?,
                symbol: "WETH".to_string(),
                decimals: Some(18),
                balance: Some(U256::from(5u64) * U256::exp10(18)),
                allowance: Some(U256::zero()),
            },
            TokenInfo {
                address: Address::from_str("0x4F96Fe3b7A6Cf9725f59d353F723c1bDb64CA6Aa")?,
                symbol: "DAI".to_string(),
                decimals: Some(18),
                balance: Some(U256::zero()),
                allowance: Some(U256::zero()),
            },
        ]))
    }
}

fn demo_price(token_in: &str, token_out: &str) -> Decimal {
    match (token_in, token_out) {
        ("WETH", "DAI") => Decimal::from(2_000),
        ("DAI", "WETH") => Decimal::new(5, 4),
        _ => Decimal::ONE,
    }
}

#[async_trait]
impl ExecutionService for DemoExecutionService {
    async fn lookup_token(&self, identifier: &str) -> Result<TokenInfo> {
        let tokens = self.tokens.lock().await;
        let wanted = Address::from_str(identifier.trim()).ok();
        tokens
            .values()
            .find(|token| {
                Some(token.address) == wanted || token.symbol.eq_ignore_ascii_case(identifier.trim())
            })
            .cloned()
            .ok_or_else(|| anyhow!("demo: unknown token {identifier}"))
    }

    async fn increase_spending(&self, token: &Token, amount: U256) -> Result<()> {
        let mut tokens = self.tokens.lock().await;
        let entry = tokens
            .get_mut(&token.address)
            .ok_or_else(|| anyhow!("demo: unknown token {}", token.symbol))?;
        entry.allowance = Some(amount);
        info!("demo: allowance for {} set to {}", token.symbol, amount);
        Ok(())
    }

    async fn prepare_order(&self, request: OrderRequest) -> Result<PrepareResponse> {
        let amount_in = to_human(request.amount_in, request.token_in.decimals)?;
        let price = demo_price(&request.token_in.symbol, &request.token_out.symbol);
        let amount_out = amount_in
            .checked_mul(price)
            .ok_or_else(|| anyhow!("demo: quote overflow"))?
            .normalize();
        let amount_out_units = normalize_amount(amount_out, request.token_out.decimals)?;

        let params = request.algo.params();
        let id = Uuid::new_v4().to_string();
        self.prepared.lock().await.insert(id.clone());

        let quote = json!({
            "orderId": id,
            "algo": request.algo.algo_type().as_str(),
            "tokenIn": request.token_in.symbol,
            "tokenOut": request.token_out.symbol,
            "amountIn": amount_in.to_string(),
            "estimatedAmountOut": amount_out.to_string(),
            "estimatedAmountOutUnits": amount_out_units.to_string(),
            "price": price.to_string(),
            "rounds": params.max_rounds.map(|rounds| rounds.get()).unwrap_or(1),
            "policies": params.policies,
            "quotedAtMs": timestamp_ms(),
            "demo": true,
        });

        Ok(PrepareResponse {
            error: None,
            order: Some(PreparedOrder { id, quote }),
        })
    }

    async fn submit_order(&self, order: &PreparedOrder) -> Result<Value> {
        if !self.prepared.lock().await.remove(&order.id) {
            return Err(anyhow!("demo: order {} was never prepared", order.id));
        }
        Ok(json!({
            "status": "submitted",
            "orderId": order.id,
            "demo": true,
        }))
    }
}
