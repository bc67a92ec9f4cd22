//! Order composition pipeline.
//!
//! A draft moves through the stages below exactly once. Every step either
//! advances the pipeline or returns an [`OrderError`]; nothing is retried and
//! nothing survives the call.
//!
//! ```text
//! START -> VALIDATED_INPUTS -> ALGO_RESOLVED -> FUNDS_CHECKED
//!       -> ALLOWANCE_SATISFIED -> ASSEMBLED -> DELEGATED
//! ```

use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::info;

use crate::{
    algo::resolve_algo,
    amount::normalize_amount,
    error::OrderError,
    guard::{check_balance, ensure_allowance, ApprovalPolicy},
    order::{OrderConfig, OrderDraft, OrderRequest, PrepareResponse},
    service::ExecutionService,
    time::timestamp_ms,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStage {
    Start,
    ValidatedInputs,
    AlgoResolved,
    FundsChecked,
    AllowanceSatisfied,
    Assembled,
    Delegated,
}

impl OrderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStage::Start => "START",
            OrderStage::ValidatedInputs => "VALIDATED_INPUTS",
            OrderStage::AlgoResolved => "ALGO_RESOLVED",
            OrderStage::FundsChecked => "FUNDS_CHECKED",
            OrderStage::AllowanceSatisfied => "ALLOWANCE_SATISFIED",
            OrderStage::Assembled => "ASSEMBLED",
            OrderStage::Delegated => "DELEGATED",
        }
    }
}

impl fmt::Display for OrderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted each time the pipeline advances.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageEvent {
    pub stage: OrderStage,
    pub ts_ms: i64,
    pub detail: Value,
}

struct Pipeline<'a> {
    stage: OrderStage,
    events: Option<&'a mpsc::UnboundedSender<StageEvent>>,
}

impl<'a> Pipeline<'a> {
    fn new(stage: OrderStage, events: Option<&'a mpsc::UnboundedSender<StageEvent>>) -> Self {
        Self { stage, events }
    }

    fn advance(&mut self, next: OrderStage, detail: Value) {
        debug_assert!(next > self.stage, "pipeline cannot move from {} to {next}", self.stage);
        self.stage = next;
        info!(stage = %next, "order pipeline advanced");
        if let Some(events) = self.events {
            // a dropped receiver only means nobody is recording
            let _ = events.send(StageEvent {
                stage: next,
                ts_ms: timestamp_ms(),
                detail,
            });
        }
    }
}

/// Turns order drafts into prepared orders against one execution service.
pub struct OrderFactory<'a, S: ?Sized> {
    service: &'a S,
    approval: ApprovalPolicy,
    events: Option<mpsc::UnboundedSender<StageEvent>>,
}

impl<'a, S> OrderFactory<'a, S>
where
    S: ExecutionService + ?Sized,
{
    pub fn new(service: &'a S, approval: ApprovalPolicy) -> Self {
        Self {
            service,
            approval,
            events: None,
        }
    }

    pub fn with_stage_events(mut self, events: mpsc::UnboundedSender<StageEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Validates `draft`, approves spending if needed and asks the service to
    /// prepare the order. The service response is returned as-is, including
    /// any `error` it carries.
    pub async fn create(&self, draft: OrderDraft) -> Result<PrepareResponse, OrderError> {
        let request = self.assemble(draft).await?;
        self.delegate(request).await
    }

    /// Runs every local check and the allowance repair, stopping at
    /// [`OrderStage::Assembled`].
    pub async fn assemble(&self, draft: OrderDraft) -> Result<OrderRequest, OrderError> {
        let mut pipeline = Pipeline::new(OrderStage::Start, self.events.as_ref());

        let config = OrderConfig::try_from(draft)?;
        let amount_in = normalize_amount(config.amount_in, config.token_in.decimals)?;
        pipeline.advance(
            OrderStage::ValidatedInputs,
            json!({
                "tokenIn": config.token_in.symbol,
                "tokenOut": config.token_out.symbol,
                "amountIn": config.amount_in.to_string(),
                "amountInUnits": amount_in.to_string(),
            }),
        );

        info!("creating algo of type {}", config.algo.algo_type);
        let algo = resolve_algo(config.algo)?;
        pipeline.advance(
            OrderStage::AlgoResolved,
            json!({
                "algo": algo.algo_type().as_str(),
                "policies": algo.params().policies.len(),
                "maxRounds": algo.params().max_rounds,
            }),
        );

        info!("checking single-order token balance...");
        check_balance(&config.token_in, amount_in)?;
        pipeline.advance(
            OrderStage::FundsChecked,
            json!({ "balance": config.token_in.balance.to_string() }),
        );

        info!("checking single-order spend allowance...");
        let action =
            ensure_allowance(self.service, &config.token_in, amount_in, self.approval).await?;
        pipeline.advance(
            OrderStage::AllowanceSatisfied,
            serde_json::to_value(action).unwrap_or_default(),
        );

        let request = OrderRequest {
            token_in: config.token_in,
            token_out: config.token_out,
            amount_in,
            algo,
            tags: config.order_tags,
        };
        pipeline.advance(
            OrderStage::Assembled,
            serde_json::to_value(&request).unwrap_or_default(),
        );
        Ok(request)
    }

    /// Hands an assembled request to the execution service for pricing.
    pub async fn delegate(&self, request: OrderRequest) -> Result<PrepareResponse, OrderError> {
        let mut pipeline = Pipeline::new(OrderStage::Assembled, self.events.as_ref());

        info!("preparing and validating order...");
        let response = self
            .service
            .prepare_order(request)
            .await
            .map_err(OrderError::PrepareFailed)?;
        pipeline.advance(
            OrderStage::Delegated,
            json!({
                "orderId": response.order.as_ref().map(|order| order.id.clone()),
                "error": response.error,
            }),
        );

        Ok(response)
    }
}
