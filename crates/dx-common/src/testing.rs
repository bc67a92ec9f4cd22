use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use serde_json::{json, Value};

use crate::{
    order::{OrderRequest, PrepareResponse, PreparedOrder},
    service::ExecutionService,
    token::{Token, TokenInfo},
};

pub fn token_with(decimals: u8, balance: u128, allowance: u128) -> Token {
    Token {
        address: Address::repeat_byte(0x11),
        symbol: "WETH".to_string(),
        decimals,
        balance: U256::from(balance),
        allowance: U256::from(allowance),
    }
}

pub fn weth(balance: U256, allowance: U256) -> TokenInfo {
    TokenInfo {
        address: Address::repeat_byte(0x11),
        symbol: "WETH".to_string(),
        decimals: Some(18),
        balance: Some(balance),
        allowance: Some(allowance),
    }
}

pub fn dai() -> TokenInfo {
    TokenInfo {
        address: Address::repeat_byte(0x22),
        symbol: "DAI".to_string(),
        decimals: Some(18),
        balance: None,
        allowance: None,
    }
}

pub fn ether(units: u64) -> U256 {
    U256::from(units) * U256::exp10(18)
}

/// Execution service double that records every call it receives.
#[derive(Default)]
pub struct RecordingService {
    tokens: Vec<TokenInfo>,
    approvals: Mutex<Vec<(String, U256)>>,
    prepared: Mutex<Vec<Value>>,
    fail_approvals: bool,
    reject_with: Option<String>,
}

impl RecordingService {
    pub fn with_tokens(tokens: Vec<TokenInfo>) -> Self {
        Self {
            tokens,
            ..Default::default()
        }
    }

    pub fn failing_approvals(mut self) -> Self {
        self.fail_approvals = true;
        self
    }

    pub fn rejecting(mut self, message: &str) -> Self {
        self.reject_with = Some(message.to_string());
        self
    }

    pub fn approvals(&self) -> Vec<(String, U256)> {
        self.approvals.lock().unwrap().clone()
    }

    pub fn prepared(&self) -> Vec<Value> {
        self.prepared.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionService for RecordingService {
    async fn lookup_token(&self, identifier: &str) -> Result<TokenInfo> {
        self.tokens
            .iter()
            .find(|token| {
                token.symbol.eq_ignore_ascii_case(identifier)
                    || format!("{:?}", token.address).eq_ignore_ascii_case(identifier)
            })
            .cloned()
            .ok_or_else(|| anyhow!("unknown token {identifier}"))
    }

    async fn increase_spending(&self, token: &Token, amount: U256) -> Result<()> {
        if self.fail_approvals {
            return Err(anyhow!("approve reverted"));
        }
        self.approvals
            .lock()
            .unwrap()
            .push((token.symbol.clone(), amount));
        Ok(())
    }

    async fn prepare_order(&self, request: OrderRequest) -> Result<PrepareResponse> {
        self.prepared
            .lock()
            .unwrap()
            .push(serde_json::to_value(&request)?);
        if let Some(message) = &self.reject_with {
            return Ok(PrepareResponse {
                error: Some(message.clone()),
                order: None,
            });
        }
        Ok(PrepareResponse {
            error: None,
            order: Some(PreparedOrder {
                id: "order-1".to_string(),
                quote: json!({"amountIn": request.amount_in.to_string()}),
            }),
        })
    }

    async fn submit_order(&self, order: &PreparedOrder) -> Result<Value> {
        Ok(json!({"status": "ok", "orderId": order.id}))
    }
}
