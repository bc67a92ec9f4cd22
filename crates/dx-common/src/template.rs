use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{
    algo::AlgoSpec,
    amount::deserialize_amount,
    order::{OrderDraft, OrderTag},
    service::ExecutionService,
};

/// Parsed representation of an order template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTemplate {
    /// Token address or symbol, resolved through the execution service.
    pub token_in: String,
    pub token_out: String,
    #[serde(deserialize_with = "deserialize_amount")]
    pub amount_in: Decimal,
    #[serde(default)]
    pub order_tags: Vec<OrderTag>,
    #[serde(default)]
    pub algo: Option<AlgoSpec>,
}

impl OrderTemplate {
    pub fn as_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Looks up both tokens and assembles the draft for the order engine.
    pub async fn resolve<S>(&self, service: &S) -> Result<OrderDraft>
    where
        S: ExecutionService + ?Sized,
    {
        info!("Looking up tokens");
        let (token_in, token_out) = futures::try_join!(
            service.lookup_token(&self.token_in),
            service.lookup_token(&self.token_out),
        )
        .with_context(|| {
            format!(
                "failed to look up tokens {} / {}",
                self.token_in, self.token_out
            )
        })?;
        info!("token in: {}", token_in.symbol);

        Ok(OrderDraft {
            token_in: Some(token_in),
            token_out: Some(token_out),
            amount_in: self.amount_in,
            algo: self.algo.clone(),
            order_tags: self.order_tags.clone(),
        })
    }
}

/// Loads a template from an explicit path, or by name from `dir`
/// (`twap` resolves to `dir/twap.yaml`).
pub fn load_template(name_or_path: &str, dir: &Path) -> Result<(OrderTemplate, PathBuf)> {
    let path = template_path(name_or_path, dir);
    let source = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read template file {}", path.display()))?;
    let template: OrderTemplate = serde_yaml::from_str(&source)
        .with_context(|| format!("failed to deserialize template from {}", path.display()))?;
    Ok((template, path))
}

fn template_path(name_or_path: &str, dir: &Path) -> PathBuf {
    let candidate = PathBuf::from(name_or_path);
    if candidate.extension().is_some() || candidate.components().count() > 1 {
        return candidate;
    }
    dir.join(format!("{name_or_path}.yaml"))
}
