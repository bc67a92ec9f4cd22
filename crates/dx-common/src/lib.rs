pub mod algo;
pub mod amount;
pub mod artifacts;
pub mod engine;
pub mod error;
pub mod guard;
pub mod order;
pub mod policy;
pub mod service;
pub mod settings;
pub mod template;
pub mod time;
pub mod token;

#[cfg(test)]
mod testing;

pub use algo::{resolve_algo, Algo, AlgoParams, AlgoSpec, AlgoType};
pub use amount::{normalize_amount, to_human};
pub use artifacts::{RoutedOrderRecord, RunArtifacts, StageRecord};
pub use engine::{OrderFactory, OrderStage, StageEvent};
pub use error::{OrderError, SettingsError};
pub use guard::{check_balance, ensure_allowance, plan_allowance, AllowanceAction, ApprovalPolicy};
pub use order::{OrderConfig, OrderDraft, OrderRequest, OrderTag, PrepareResponse, PreparedOrder};
pub use policy::{BasePrice, BoundedDelay, GasCost, GasType, Policy, PriceBounds, Slippage};
pub use service::ExecutionService;
pub use settings::{ProviderTarget, SdkSettings, ValidatedSettings};
pub use template::{load_template, OrderTemplate};
pub use time::timestamp_ms;
pub use token::{Token, TokenInfo};
