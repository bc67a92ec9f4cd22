//! Conversion between human-scale token quantities and on-chain minor units.
//!
//! Amounts are carried as [`Decimal`] and turned into fixed-point text before
//! being parsed as an integer, so no floating-point value ever reaches the
//! chain.

use std::{fmt, str::FromStr};

use ethers::{
    types::U256,
    utils::{format_units, parse_units},
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{de, Deserializer, Serializer};

use crate::error::OrderError;

/// Largest number of fractional digits a `Decimal` can carry.
const MAX_DECIMAL_SCALE: u32 = 28;
/// Base-10 digits that always fit in a `U256`.
const MAX_U256_DIGITS: u32 = 77;

/// Scales `amount` to the token's minor units.
///
/// The amount is rounded half away from zero to `decimals` fractional digits
/// and then parsed as a fixed-point integer of that precision.
pub fn normalize_amount(amount: Decimal, decimals: u8) -> Result<U256, OrderError> {
    if amount.is_sign_negative() || amount.is_zero() {
        return Err(OrderError::invalid_amount(amount, "amount must be positive"));
    }

    let scale = u32::from(decimals);
    let fixed = amount.round_dp_with_strategy(
        scale.min(MAX_DECIMAL_SCALE),
        RoundingStrategy::MidpointAwayFromZero,
    );
    if fixed.is_zero() {
        return Err(OrderError::invalid_amount(
            amount,
            format!("amount rounds to zero at {decimals} decimals"),
        ));
    }

    let integer_digits = fixed.trunc().to_string().len() as u32;
    if integer_digits + scale > MAX_U256_DIGITS {
        return Err(OrderError::invalid_amount(
            amount,
            format!("amount does not fit in 256 bits at {decimals} decimals"),
        ));
    }

    let minor: U256 = parse_units(fixed.to_string(), scale)
        .map_err(|err| OrderError::invalid_amount(amount, err.to_string()))?
        .into();
    Ok(minor)
}

/// Converts minor units back into a human-scale decimal.
pub fn to_human(amount: U256, decimals: u8) -> Result<Decimal, OrderError> {
    let text = format_units(amount, u32::from(decimals))
        .map_err(|err| OrderError::invalid_amount(amount, err.to_string()))?;
    let trimmed = match text.split_once('.') {
        Some((integer, fraction)) => match fraction.trim_end_matches('0') {
            "" => integer.to_string(),
            fraction => format!("{integer}.{fraction}"),
        },
        None => text.clone(),
    };
    Decimal::from_str(&trimmed)
        .map(|value| value.normalize())
        .map_err(|err| OrderError::invalid_amount(text, err.to_string()))
}

/// Serializes a minor-unit amount as a base-10 string.
pub fn serialize_minor_units<S>(amount: &U256, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&amount.to_string())
}

/// Deserializes a human amount from either a number or a numeric string.
///
/// Numbers go through their shortest textual form so that `4.4` stays `4.4`
/// rather than the nearest binary float.
pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    struct AmountVisitor;

    impl<'de> de::Visitor<'de> for AmountVisitor {
        type Value = Decimal;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a decimal number or numeric string")
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !value.is_finite() {
                return Err(E::custom("amount must be finite"));
            }
            Decimal::from_str(&value.to_string()).map_err(E::custom)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Decimal::from(value))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Decimal::from(value))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Decimal::from_str(value.trim()).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(AmountVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    fn dec(raw: &str) -> Decimal {
        Decimal::from_str(raw).unwrap()
    }

    #[test]
    fn normalizes_without_float_drift() {
        let minor = normalize_amount(dec("4.4"), 18).unwrap();
        assert_eq!(minor, U256::from_dec_str("4400000000000000000").unwrap());
    }

    #[test]
    fn rounds_to_token_precision() {
        assert_eq!(normalize_amount(dec("1.23456"), 2).unwrap(), U256::from(123));
        assert_eq!(normalize_amount(dec("1.235"), 2).unwrap(), U256::from(124));
        assert_eq!(normalize_amount(dec("12.5"), 0).unwrap(), U256::from(13));
        assert_eq!(normalize_amount(dec("250.1"), 6).unwrap(), U256::from(250_100_000u64));
    }

    #[test]
    fn rejects_non_positive_amounts() {
        assert!(matches!(
            normalize_amount(Decimal::ZERO, 18),
            Err(OrderError::InvalidAmount { .. })
        ));
        assert!(matches!(
            normalize_amount(dec("-1"), 18),
            Err(OrderError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn rejects_amount_lost_to_rounding() {
        let err = normalize_amount(dec("0.001"), 2).unwrap_err();
        assert!(err.to_string().contains("rounds to zero"));
    }

    #[test]
    fn rejects_precision_beyond_u256() {
        assert!(matches!(
            normalize_amount(dec("1"), 90),
            Err(OrderError::InvalidAmount { .. })
        ));
        assert!(matches!(
            normalize_amount(dec("1000000000000"), 70),
            Err(OrderError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn converts_back_to_human_units() {
        let minor = U256::from_dec_str("4400000000000000000").unwrap();
        assert_eq!(to_human(minor, 18).unwrap(), dec("4.4"));
    }

    #[test]
    fn zero_minor_units_convert_to_zero() {
        assert_eq!(to_human(U256::zero(), 18).unwrap(), Decimal::ZERO);
        assert_eq!(to_human(U256::zero(), 0).unwrap(), Decimal::ZERO);
        assert_eq!(to_human(U256::from(100), 0).unwrap(), dec("100"));
        assert_eq!(to_human(U256::from(1_000_000u64), 6).unwrap(), dec("1"));
    }

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "deserialize_amount")]
        amount: Decimal,
    }

    #[test]
    fn deserializes_numbers_and_strings() {
        let from_float: Holder = serde_json::from_str(r#"{"amount": 4.4}"#).unwrap();
        assert_eq!(from_float.amount, dec("4.4"));
        let from_int: Holder = serde_json::from_str(r#"{"amount": 3}"#).unwrap();
        assert_eq!(from_int.amount, dec("3"));
        let from_str: Holder = serde_json::from_str(r#"{"amount": " 0.125 "}"#).unwrap();
        assert_eq!(from_str.amount, dec("0.125"));
        assert!(serde_json::from_str::<Holder>(r#"{"amount": "lots"}"#).is_err());
    }

    proptest! {
        #[test]
        fn round_trips_within_token_precision(
            units in 1u64..=1_000_000_000u64,
            scale in 0u32..=12,
            decimals in 0u8..=18,
        ) {
            let amount = Decimal::from_i128_with_scale(i128::from(units), scale);
            let expected = amount
                .round_dp_with_strategy(u32::from(decimals), RoundingStrategy::MidpointAwayFromZero)
                .normalize();
            prop_assume!(!expected.is_zero());

            let minor = normalize_amount(amount, decimals).unwrap();
            prop_assert_eq!(to_human(minor, decimals).unwrap(), expected);
        }
    }
}
