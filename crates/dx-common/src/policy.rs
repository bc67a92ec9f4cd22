use serde::{Deserialize, Serialize};

/// Execution policy attached to an algorithm.
///
/// The order engine never evaluates these; it forwards them to the execution
/// service in the order they were declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Policy {
    GasCost(GasCost),
    Slippage(Slippage),
    BoundedDelay(BoundedDelay),
    PriceBounds(PriceBounds),
}

impl Policy {
    pub fn kind(&self) -> &'static str {
        match self {
            Policy::GasCost(_) => "gasCost",
            Policy::Slippage(_) => "slippage",
            Policy::BoundedDelay(_) => "boundedDelay",
            Policy::PriceBounds(_) => "priceBounds",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasType {
    Relative,
    Fixed,
}

/// `deviation` is a relative offset for `relative`, gwei for `fixed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasCost {
    pub gas_type: GasType,
    #[serde(default)]
    pub deviation: f64,
}

/// Slippage tolerance in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slippage {
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundedDelay {
    pub time_window_seconds: u64,
    #[serde(default)]
    pub randomize_delay: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBounds {
    pub base_price: BasePrice,
    pub lower_bound_percent: f64,
    pub upper_bound_percent: f64,
}

/// Reference price expressed as `in_amount` of the input token buying
/// `out_amount` of the output token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasePrice {
    pub in_amount: f64,
    pub out_amount: f64,
}
