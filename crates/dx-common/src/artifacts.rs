use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    engine::StageEvent,
    order::{OrderRequest, PreparedOrder},
};

/// One line of `stages.jsonl`. Pipeline stages and driver steps share the
/// same shape.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub ts_ms: i64,
    pub stage: String,
    pub detail: Value,
}

impl From<StageEvent> for StageRecord {
    fn from(event: StageEvent) -> Self {
        StageRecord {
            ts_ms: event.ts_ms,
            stage: event.stage.as_str().to_string(),
            detail: event.detail,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedOrderRecord {
    pub ts_ms: i64,
    pub order_id: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
    pub algo: String,
    pub policies: String,
    pub tags: String,
}

impl RoutedOrderRecord {
    pub fn new(ts_ms: i64, request: &OrderRequest, order: &PreparedOrder) -> Self {
        let params = request.algo.params();
        RoutedOrderRecord {
            ts_ms,
            order_id: order.id.clone(),
            token_in: request.token_in.symbol.clone(),
            token_out: request.token_out.symbol.clone(),
            amount_in: request.amount_in.to_string(),
            algo: request.algo.algo_type().to_string(),
            policies: params
                .policies
                .iter()
                .map(|policy| policy.kind())
                .collect::<Vec<_>>()
                .join("|"),
            tags: request
                .tags
                .iter()
                .map(|tag| format!("{}={}", tag.name, tag.value))
                .collect::<Vec<_>>()
                .join("|"),
        }
    }
}

pub struct RunArtifacts {
    stages: BufWriter<File>,
    routed_csv: csv::Writer<File>,
    stages_path: PathBuf,
    quote_path: PathBuf,
    meta_path: PathBuf,
}

impl RunArtifacts {
    pub fn create<P: AsRef<Path>>(out_dir: P, template: &Value) -> Result<Self> {
        let out_dir = out_dir.as_ref();
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create run directory {}", out_dir.display()))?;

        let stages_path = out_dir.join("stages.jsonl");
        let routed_path = out_dir.join("orders_routed.csv");
        let template_path = out_dir.join("template.json");

        let stages = BufWriter::new(
            File::create(&stages_path)
                .with_context(|| format!("failed to create {}", stages_path.display()))?,
        );
        let routed_file = File::create(&routed_path)
            .with_context(|| format!("failed to create {}", routed_path.display()))?;
        let mut routed_csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(routed_file);
        routed_csv.write_record([
            "ts",
            "orderId",
            "tokenIn",
            "tokenOut",
            "amountIn",
            "algo",
            "policies",
            "tags",
        ])?;
        routed_csv.flush()?;

        let template_writer = File::create(&template_path)
            .with_context(|| format!("failed to create {}", template_path.display()))?;
        serde_json::to_writer_pretty(template_writer, template).with_context(|| {
            format!("failed to write template json {}", template_path.display())
        })?;

        Ok(Self {
            stages,
            routed_csv,
            stages_path,
            quote_path: out_dir.join("quote.json"),
            meta_path: out_dir.join("run_meta.json"),
        })
    }

    pub fn log_stage(&mut self, record: &StageRecord) -> Result<()> {
        serde_json::to_writer(&mut self.stages, record).with_context(|| {
            format!("failed to write stage log to {}", self.stages_path.display())
        })?;
        self.stages.write_all(b"\n")?;
        self.stages.flush()?;
        Ok(())
    }

    pub fn log_routed_order(&mut self, record: &RoutedOrderRecord) -> Result<()> {
        self.routed_csv.serialize(record)?;
        self.routed_csv.flush()?;
        Ok(())
    }

    pub fn write_quote(&self, quote: &Value) -> Result<()> {
        write_pretty(&self.quote_path, quote)
    }

    pub fn write_meta(&self, meta: &Value) -> Result<()> {
        write_pretty(&self.meta_path, meta)
    }
}

fn write_pretty(path: &Path, value: &Value) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        algo::{Algo, AlgoParams, AlgoType},
        engine::OrderStage,
        order::OrderTag,
        policy::{Policy, Slippage},
        testing::token_with,
    };
    use ethers::types::U256;
    use serde_json::json;
    use uuid::Uuid;

    fn tmp_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("dx-artifacts-test-{}", Uuid::new_v4()));
        dir
    }

    fn request() -> OrderRequest {
        let mut token_out = token_with(18, 0, 0);
        token_out.symbol = "DAI".to_string();
        OrderRequest {
            token_in: token_with(18, 0, 0),
            token_out,
            amount_in: U256::from(4_400u64),
            algo: Algo::new(
                AlgoType::Twap,
                AlgoParams {
                    policies: vec![Policy::Slippage(Slippage { amount: 0.5 })],
                    max_rounds: None,
                },
            ),
            tags: vec![OrderTag {
                name: "desk".to_string(),
                value: "a".to_string(),
            }],
        }
    }

    #[test]
    fn writes_every_artifact() {
        let dir = tmp_dir();
        let mut artifacts = RunArtifacts::create(&dir, &json!({"tokenIn": "WETH"})).unwrap();

        artifacts
            .log_stage(&StageRecord::from(StageEvent {
                stage: OrderStage::ValidatedInputs,
                ts_ms: 10,
                detail: json!({"amountInUnits": "4400"}),
            }))
            .unwrap();
        let order = PreparedOrder {
            id: "order-9".to_string(),
            quote: json!({"price": 2000}),
        };
        artifacts
            .log_routed_order(&RoutedOrderRecord::new(11, &request(), &order))
            .unwrap();
        artifacts.write_quote(&order.quote).unwrap();
        artifacts.write_meta(&json!({"outcome": "submitted"})).unwrap();

        let template: Value =
            serde_json::from_str(&fs::read_to_string(dir.join("template.json")).unwrap()).unwrap();
        assert_eq!(template["tokenIn"], "WETH");

        let stages = fs::read_to_string(dir.join("stages.jsonl")).unwrap();
        let record: StageRecord = serde_json::from_str(stages.lines().next().unwrap()).unwrap();
        assert_eq!(record.stage, "VALIDATED_INPUTS");
        assert_eq!(record.detail["amountInUnits"], "4400");

        let routed = fs::read_to_string(dir.join("orders_routed.csv")).unwrap();
        let mut lines = routed.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ts,orderId,tokenIn,tokenOut,amountIn,algo,policies,tags"
        );
        assert_eq!(lines.next().unwrap(), "11,order-9,WETH,DAI,4400,TWAP,slippage,desk=a");

        let quote: Value =
            serde_json::from_str(&fs::read_to_string(dir.join("quote.json")).unwrap()).unwrap();
        assert_eq!(quote["price"], 2000);
        assert!(dir.join("run_meta.json").exists());
    }
}
