mod demo;
mod live;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use dx_common::{
    load_template,
    time::timestamp_ms,
    ApprovalPolicy, ExecutionService, OrderError, OrderFactory, OrderTemplate, RoutedOrderRecord,
    RunArtifacts, SdkSettings, StageEvent, StageRecord,
};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::{
    demo::DemoExecutionService,
    live::{LiveConfig, LiveExecutionService},
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Compose, approve and submit algorithmic DEX orders from YAML templates"
)]
struct Cli {
    /// Template name under --templates-dir, or a path to a YAML template
    template: String,

    /// Directory searched for named templates
    #[arg(long, default_value = "templates")]
    templates_dir: PathBuf,

    /// Output directory. Defaults to runs/<timestamp>
    #[arg(long)]
    out: Option<PathBuf>,

    /// Chain id the wallet signs for (defaults to 1)
    #[arg(long, env = "CHAIN_ID")]
    chain_id: Option<u64>,

    /// Hex-encoded private key for the trading wallet
    #[arg(long, env = "WALLET")]
    wallet: Option<String>,

    /// JSON-RPC endpoint, used when no Infura project id is given
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,

    #[arg(long, env = "INFURA_PROJECT_ID")]
    infura_id: Option<String>,

    /// Approve spend shortfalls automatically
    #[arg(long, env = "AUTO_SPEND_APPROVAL", default_value_t = false)]
    auto_spend_approval: bool,

    /// Approve the maximum amount instead of the exact order size
    #[arg(long, env = "INFINITE_SPEND_APPROVAL", default_value_t = false)]
    infinite_spend_approval: bool,

    /// Base URL of the execution API
    #[arg(long, env = "EXECUTION_API_URL")]
    api_url: Option<String>,

    /// Contract allowed to spend the input token
    #[arg(long, env = "SPENDER_ADDRESS")]
    spender: Option<String>,

    /// Run entirely locally against an in-memory execution service
    #[arg(long, default_value_t = false)]
    demo: bool,

    /// Stop after the quote without submitting
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

impl Cli {
    /// Demo runs always approve allowance shortfalls; the seeded wallet starts
    /// with none.
    fn approval_policy(&self, settings: &SdkSettings) -> ApprovalPolicy {
        let configured = settings.approval_policy();
        if self.demo {
            ApprovalPolicy {
                automatic: true,
                ..configured
            }
        } else {
            configured
        }
    }

    fn settings(&self) -> SdkSettings {
        SdkSettings {
            chain_id: self.chain_id,
            wallet: self.wallet.clone(),
            rpc_url: self.rpc_url.clone(),
            infura_id: self.infura_id.clone(),
            automatic_spend_approval: self.auto_spend_approval,
            use_infinite_spend_approval: self.infinite_spend_approval,
        }
    }
}

#[derive(Debug)]
enum RunOutcome {
    Quoted { order_id: String },
    Submitted { order_id: String, receipt: Value },
}

impl RunOutcome {
    fn as_json(&self) -> Value {
        match self {
            RunOutcome::Quoted { order_id } => json!({"status": "quoted", "orderId": order_id}),
            RunOutcome::Submitted { order_id, receipt } => {
                json!({"status": "submitted", "orderId": order_id, "receipt": receipt})
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = cli.settings();

    let (template, template_path) = load_template(&cli.template, &cli.templates_dir)?;

    let timestamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let out_dir = cli
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from("runs").join(&timestamp));

    let template_json = template.as_json();
    let mut artifacts = RunArtifacts::create(&out_dir, &template_json)?;
    let approval = cli.approval_policy(&settings);

    let (wallet_hex, outcome) = if cli.demo {
        info!("demo mode enabled, skipping network execution");
        let service = DemoExecutionService::seeded()?;
        let outcome = run_order(&service, &template, approval, &mut artifacts, cli.dry_run).await;
        (None, outcome)
    } else {
        let validated = settings.validate()?;
        let config = LiveConfig::new(cli.api_url.as_deref(), cli.spender.as_deref())?;
        info!("Creating SDK instance");
        let service = LiveExecutionService::connect(&validated, config).await?;
        let wallet_hex = format!("0x{:x}", service.wallet_address());
        let outcome = run_order(&service, &template, approval, &mut artifacts, cli.dry_run).await;
        (Some(wallet_hex), outcome)
    };

    let meta = build_run_meta(
        &cli,
        &settings,
        approval,
        &timestamp,
        &out_dir,
        &template_path,
        wallet_hex,
        &outcome,
    )?;
    artifacts.write_meta(&meta)?;
    info!("run artifacts stored under {}", out_dir.display());

    match outcome {
        Ok(RunOutcome::Quoted { order_id }) => {
            info!("dry run: order {order_id} prepared but not submitted");
            Ok(())
        }
        Ok(RunOutcome::Submitted { order_id, .. }) => {
            info!("order {order_id} submitted");
            Ok(())
        }
        Err(err) => {
            error!("{err:#}");
            Err(err)
        }
    }
}

/// Resolves the template, runs the order pipeline and, unless `dry_run`,
/// submits the prepared order.
async fn run_order<S>(
    service: &S,
    template: &OrderTemplate,
    approval: ApprovalPolicy,
    artifacts: &mut RunArtifacts,
    dry_run: bool,
) -> Result<RunOutcome>
where
    S: ExecutionService + ?Sized,
{
    let draft = template.resolve(service).await?;
    log_step(
        artifacts,
        "TOKENS_RESOLVED",
        json!({
            "tokenIn": draft.token_in,
            "tokenOut": draft.token_out,
        }),
    )?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let factory = OrderFactory::new(service, approval).with_stage_events(tx);

    let assembled = factory.assemble(draft).await;
    drain_stages(&mut rx, artifacts)?;
    let request = assembled?;

    let delegated = factory.delegate(request.clone()).await;
    drain_stages(&mut rx, artifacts)?;
    let response = delegated?;

    if let Some(message) = &response.error {
        error!("execution service rejected order: {message}");
    }
    let order = response.into_order()?;

    artifacts.log_routed_order(&RoutedOrderRecord::new(timestamp_ms(), &request, &order))?;
    artifacts.write_quote(&order.quote)?;
    info!(
        "QUOTE {}",
        serde_json::to_string_pretty(&order.quote).context("failed to render quote")?
    );

    if dry_run {
        return Ok(RunOutcome::Quoted { order_id: order.id });
    }

    let receipt = service
        .submit_order(&order)
        .await
        .with_context(|| format!("failed to submit order {}", order.id))?;
    log_step(artifacts, "SUBMITTED", receipt.clone())?;

    Ok(RunOutcome::Submitted {
        order_id: order.id,
        receipt,
    })
}

fn drain_stages(
    rx: &mut mpsc::UnboundedReceiver<StageEvent>,
    artifacts: &mut RunArtifacts,
) -> Result<()> {
    while let Ok(event) = rx.try_recv() {
        artifacts.log_stage(&StageRecord::from(event))?;
    }
    Ok(())
}

fn log_step(artifacts: &mut RunArtifacts, step: &str, detail: Value) -> Result<()> {
    artifacts.log_stage(&StageRecord {
        ts_ms: timestamp_ms(),
        stage: step.to_string(),
        detail,
    })
}

fn template_digest(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to re-read template {}", path.display()))?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

fn failure_json(err: &anyhow::Error) -> Value {
    match err.downcast_ref::<OrderError>() {
        Some(order_err) => json!({
            "stage": order_err.stage().as_str(),
            "kind": order_err.kind(),
            "message": order_err.to_string(),
        }),
        None => json!({
            "stage": Value::Null,
            "kind": "driver",
            "message": format!("{err:#}"),
        }),
    }
}

fn build_run_meta(
    cli: &Cli,
    settings: &SdkSettings,
    approval: ApprovalPolicy,
    timestamp: &str,
    out_dir: &Path,
    template_path: &Path,
    wallet: Option<String>,
    outcome: &Result<RunOutcome>,
) -> Result<Value> {
    let network_label = if cli.demo { "demo" } else { "live" };
    let mut meta = json!({
        "network": network_label,
        "chainId": settings.chain_id(),
        "wallet": wallet,
        "approval": approval,
        "template": {
            "name": cli.template,
            "path": template_path.display().to_string(),
            "sha256": template_digest(template_path)?,
        },
        "outDir": out_dir.display().to_string(),
        "timestamp": timestamp,
        "dryRun": cli.dry_run,
        "demoMode": cli.demo,
    });

    match outcome {
        Ok(outcome) => meta["outcome"] = outcome.as_json(),
        Err(err) => meta["failure"] = failure_json(err),
    }

    Ok(meta)
}
