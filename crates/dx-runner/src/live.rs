use std::{str::FromStr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use dx_common::{
    ExecutionService, OrderRequest, PrepareResponse, PreparedOrder, Token, TokenInfo,
    ValidatedSettings,
};
use ethers::{
    contract::abigen,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, U256, U64},
};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{info, warn};

abigen!(
    Erc20,
    r#"[
        function symbol() external view returns (string)
        function decimals() external view returns (uint8)
        function balanceOf(address owner) external view returns (uint256)
        function allowance(address owner, address spender) external view returns (uint256)
        function approve(address spender, uint256 amount) external returns (bool)
    ]"#
);

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct LiveConfig {
    pub api_url: String,
    pub spender: Address,
}

impl LiveConfig {
    pub fn new(api_url: Option<&str>, spender: Option<&str>) -> Result<Self> {
        let api_url = api_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                anyhow!("--api-url or EXECUTION_API_URL must be provided unless --demo is set")
            })?;
        let spender = spender.ok_or_else(|| {
            anyhow!("--spender or SPENDER_ADDRESS must be provided unless --demo is set")
        })?;
        let spender = Address::from_str(spender.trim())
            .map_err(|e| anyhow!("failed to parse spender address: {e}"))?;
        Ok(Self { api_url, spender })
    }
}

/// Execution service backed by the chain for token state and approvals, and
/// by the HTTP execution API for pricing and submission.
pub struct LiveExecutionService {
    client: Arc<SignerClient>,
    http: Client,
    chain_id: u64,
    config: LiveConfig,
}

impl LiveExecutionService {
    pub async fn connect(settings: &ValidatedSettings, config: LiveConfig) -> Result<Self> {
        let endpoint = settings.provider.endpoint(settings.chain_id)?;
        let provider = Provider::<Http>::try_from(endpoint.as_str())
            .with_context(|| format!("failed to build provider for {endpoint}"))?;

        let remote_chain = provider
            .get_chainid()
            .await
            .context("failed to query chain id from provider")?;
        if remote_chain != U256::from(settings.chain_id) {
            warn!(
                "provider reports chain id {} but {} is configured",
                remote_chain, settings.chain_id
            );
        }

        let wallet = LocalWallet::from_str(settings.wallet.trim())
            .map_err(|e| anyhow!("failed to parse wallet private key: {e}"))?
            .with_chain_id(settings.chain_id);
        info!("wallet address 0x{:x}", wallet.address());

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client: Arc::new(SignerMiddleware::new(provider, wallet)),
            http,
            chain_id: settings.chain_id,
            config,
        })
    }

    pub fn wallet_address(&self) -> Address {
        self.client.signer().address()
    }

    fn token_address(&self, identifier: &str) -> Result<Address> {
        if let Ok(address) = Address::from_str(identifier.trim()) {
            return Ok(address);
        }
        known_token(self.chain_id, identifier).ok_or_else(|| {
            anyhow!(
                "'{identifier}' is neither an address nor a known token on chain {}",
                self.chain_id
            )
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<String> {
        let url = format!("{}{}", self.config.api_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to send request to {url}"))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("failed to read response body from {url}"))?;

        if !status.is_success() {
            // rejections may still arrive as a structured prepare response
            if serde_json::from_str::<PrepareResponse>(&text)
                .map(|parsed| parsed.error.is_some())
                .unwrap_or(false)
            {
                return Ok(text);
            }
            return Err(anyhow!("{url} returned status {status} with body: {text}"));
        }
        Ok(text)
    }
}

#[async_trait]
impl ExecutionService for LiveExecutionService {
    async fn lookup_token(&self, identifier: &str) -> Result<TokenInfo> {
        let address = self.token_address(identifier)?;
        let contract = Erc20::new(address, self.client.clone());
        let owner = self.wallet_address();

        let symbol = contract
            .symbol()
            .call()
            .await
            .with_context(|| format!("failed to read symbol of {address:?}"))?;
        let decimals = contract
            .decimals()
            .call()
            .await
            .with_context(|| format!("failed to read decimals of {symbol}"))?;
        let balance = contract
            .balance_of(owner)
            .call()
            .await
            .with_context(|| format!("failed to read {symbol} balance"))?;
        let allowance = contract
            .allowance(owner, self.config.spender)
            .call()
            .await
            .with_context(|| format!("failed to read {symbol} allowance"))?;

        Ok(TokenInfo {
            address,
            symbol,
            decimals: Some(decimals),
            balance: Some(balance),
            allowance: Some(allowance),
        })
    }

    async fn increase_spending(&self, token: &Token, amount: U256) -> Result<()> {
        let contract = Erc20::new(token.address, self.client.clone());
        let call = contract.approve(self.config.spender, amount);
        let pending = call
            .send()
            .await
            .with_context(|| format!("failed to send approve for {}", token.symbol))?;
        info!("approval tx {:?} sent for {}", pending.tx_hash(), token.symbol);

        let receipt = pending
            .await
            .with_context(|| format!("failed to await approve receipt for {}", token.symbol))?
            .ok_or_else(|| anyhow!("approve transaction for {} was dropped", token.symbol))?;
        if receipt.status != Some(U64::from(1)) {
            return Err(anyhow!(
                "approve transaction {:?} for {} reverted",
                receipt.transaction_hash,
                token.symbol
            ));
        }
        Ok(())
    }

    async fn prepare_order(&self, request: OrderRequest) -> Result<PrepareResponse> {
        let body = serde_json::to_value(&request).context("failed to encode order request")?;
        let text = self.post("/order/prepare", &body).await?;
        serde_json::from_str(&text).context("failed to parse prepare response JSON")
    }

    async fn submit_order(&self, order: &PreparedOrder) -> Result<Value> {
        let signature = self
            .client
            .signer()
            .sign_message(order.id.as_bytes())
            .await
            .context("failed to sign order id")?;
        let body = json!({
            "orderId": order.id,
            "signer": format!("0x{:x}", self.wallet_address()),
            "signature": format!("0x{signature}"),
        });
        let text = self.post("/order/submit", &body).await?;
        serde_json::from_str(&text).context("failed to parse submit response JSON")
    }
}

/// Well-known token addresses so templates can name tokens by symbol.
pub fn known_token(chain_id: u64, symbol: &str) -> Option<Address> {
    let address = match (chain_id, symbol.trim().to_ascii_uppercase().as_str()) {
        (1, "WETH") => "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
        (1, "DAI") => "0x6B175474E89094C44Da98b954EedeAC495271d0F",
        (1, "USDC") => "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        (42, "WETH") => "0xd0A1E359811322d97991E03f863a0C30C2cF029C",
        (42, "DAI") => "0x4F96Fe3b7A6Cf9725f59d353F723c1bDb64CA6Aa",
        _ => return None,
    };
    Address::from_str(address).ok()
}
