use std::{fmt, num::NonZeroU32, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::OrderError, policy::Policy};

/// Algorithm families understood by the execution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AlgoType {
    Limit,
    Market,
    StopLoss,
    #[serde(rename = "TWAP")]
    Twap,
}

impl AlgoType {
    pub const ALL: [AlgoType; 4] = [
        AlgoType::Limit,
        AlgoType::Market,
        AlgoType::StopLoss,
        AlgoType::Twap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlgoType::Limit => "Limit",
            AlgoType::Market => "Market",
            AlgoType::StopLoss => "StopLoss",
            AlgoType::Twap => "TWAP",
        }
    }
}

impl fmt::Display for AlgoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgoType {
    type Err = OrderError;

    /// Tags are matched exactly; `twap` is not `TWAP`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "Limit" => Ok(AlgoType::Limit),
            "Market" => Ok(AlgoType::Market),
            "StopLoss" => Ok(AlgoType::StopLoss),
            "TWAP" => Ok(AlgoType::Twap),
            other => Err(OrderError::UnsupportedAlgoType(other.to_string())),
        }
    }
}

/// Algorithm selection as written in an order template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgoSpec {
    #[serde(rename = "type", default)]
    pub algo_type: String,
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<NonZeroU32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgoParams {
    pub policies: Vec<Policy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<NonZeroU32>,
}

/// A constructed algorithm instance, one variant per family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Algo {
    Limit(AlgoParams),
    Market(AlgoParams),
    StopLoss(AlgoParams),
    #[serde(rename = "TWAP")]
    Twap(AlgoParams),
}

impl Algo {
    pub fn new(algo_type: AlgoType, params: AlgoParams) -> Self {
        match algo_type {
            AlgoType::Limit => Algo::Limit(params),
            AlgoType::Market => Algo::Market(params),
            AlgoType::StopLoss => Algo::StopLoss(params),
            AlgoType::Twap => Algo::Twap(params),
        }
    }

    pub fn algo_type(&self) -> AlgoType {
        match self {
            Algo::Limit(_) => AlgoType::Limit,
            Algo::Market(_) => AlgoType::Market,
            Algo::StopLoss(_) => AlgoType::StopLoss,
            Algo::Twap(_) => AlgoType::Twap,
        }
    }

    pub fn params(&self) -> &AlgoParams {
        match self {
            Algo::Limit(params)
            | Algo::Market(params)
            | Algo::StopLoss(params)
            | Algo::Twap(params) => params,
        }
    }
}

/// Selects the algorithm family named by `selection` and attaches its
/// policies and round cap untouched.
pub fn resolve_algo(selection: AlgoSpec) -> Result<Algo, OrderError> {
    let algo_type = selection.algo_type.parse::<AlgoType>()?;
    Ok(Algo::new(
        algo_type,
        AlgoParams {
            policies: selection.policies,
            max_rounds: selection.max_rounds,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{BoundedDelay, Slippage};
    use proptest::prelude::*;

    fn algo_spec(algo_type: &str) -> AlgoSpec {
        AlgoSpec {
            algo_type: algo_type.to_string(),
            policies: vec![
                Policy::Slippage(Slippage { amount: 0.5 }),
                Policy::BoundedDelay(BoundedDelay {
                    time_window_seconds: 60,
                    randomize_delay: false,
                }),
                Policy::Slippage(Slippage { amount: 0.5 }),
            ],
            max_rounds: NonZeroU32::new(20),
        }
    }

    #[test]
    fn resolves_every_known_family() {
        for algo_type in AlgoType::ALL {
            let algo = resolve_algo(algo_spec(algo_type.as_str())).unwrap();
            assert_eq!(algo.algo_type(), algo_type);
        }
    }

    #[test]
    fn keeps_policies_in_order_without_dedup() {
        let algo = resolve_algo(algo_spec("TWAP")).unwrap();
        let kinds: Vec<_> = algo.params().policies.iter().map(Policy::kind).collect();
        assert_eq!(kinds, vec!["slippage", "boundedDelay", "slippage"]);
        assert_eq!(algo.params().max_rounds, NonZeroU32::new(20));
    }

    #[test]
    fn match_is_case_sensitive() {
        let err = resolve_algo(algo_spec("twap")).unwrap_err();
        assert!(matches!(err, OrderError::UnsupportedAlgoType(ref t) if t == "twap"));
    }

    #[test]
    fn unknown_type_is_named_in_error() {
        let err = resolve_algo(algo_spec("Unknown")).unwrap_err();
        assert_eq!(err.to_string(), "unsupported algo type: Unknown");
    }

    #[test]
    fn serializes_with_type_tag() {
        let algo = resolve_algo(AlgoSpec {
            algo_type: "TWAP".to_string(),
            policies: vec![],
            max_rounds: None,
        })
        .unwrap();
        let value = serde_json::to_value(&algo).unwrap();
        assert_eq!(value, serde_json::json!({"type": "TWAP", "policies": []}));
    }

    #[test]
    fn zero_max_rounds_is_rejected_at_parse_time() {
        let raw = r#"{"type": "Market", "maxRounds": 0}"#;
        assert!(serde_json::from_str::<AlgoSpec>(raw).is_err());
    }

    proptest! {
        #[test]
        fn anything_outside_the_closed_set_is_unsupported(raw in "\\PC{0,16}") {
            prop_assume!(!AlgoType::ALL.iter().any(|t| t.as_str() == raw));
            let err = resolve_algo(algo_spec(&raw)).unwrap_err();
            prop_assert!(matches!(err, OrderError::UnsupportedAlgoType(ref t) if *t == raw));
        }
    }
}
