//! Decimal helpers for pricing arithmetic.
//!
//! Monetary values stay unrounded through every intermediate step; only
//! [`round_currency`] (used by presentation code) cuts them to cents.

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// Converts an `f64` through its shortest round-trip representation so that
/// `0.1` becomes exactly `0.1` rather than its binary expansion.
pub fn decimal(value: f64) -> BigDecimal {
    if !value.is_finite() {
        return BigDecimal::default();
    }
    BigDecimal::from_str(&value.to_string()).unwrap_or_default()
}

pub fn parse_decimal(raw: &str) -> Option<BigDecimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| *ch != '$' && *ch != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    BigDecimal::from_str(&cleaned).ok()
}

/// Half-up rounding to two decimal places.
pub fn round_currency(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DecimalInput {
    Text(String),
    Number(f64),
}

impl DecimalInput {
    fn into_decimal<E: serde::de::Error>(self) -> Result<BigDecimal, E> {
        match self {
            DecimalInput::Text(raw) => parse_decimal(&raw)
                .ok_or_else(|| E::custom(format!("'{raw}' is not a decimal amount"))),
            DecimalInput::Number(value) if value.is_finite() => Ok(decimal(value)),
            DecimalInput::Number(value) => Err(E::custom(format!("{value} is not finite"))),
        }
    }
}

/// Accepts either a JSON number or a string such as `"25.00"` or `"$1,250.50"`.
pub fn deserialize_decimal<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    DecimalInput::deserialize(deserializer)?.into_decimal()
}

pub fn deserialize_optional_decimal<'de, D>(
    deserializer: D,
) -> Result<Option<BigDecimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let input = Option::<DecimalInput>::deserialize(deserializer)?;
    input
        .map(|value| value.into_decimal::<D::Error>())
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_uses_shortest_representation() {
        assert_eq!(decimal(0.1), BigDecimal::from_str("0.1").expect("literal"));
        assert_eq!(decimal(100.0), BigDecimal::from(100));
        assert_eq!(decimal(f64::NAN), BigDecimal::default());
    }

    #[test]
    fn parse_decimal_strips_currency_formatting() {
        assert_eq!(
            parse_decimal("$1,250.50"),
            Some(BigDecimal::from_str("1250.50").expect("literal"))
        );
        assert_eq!(parse_decimal("  "), None);
        assert_eq!(parse_decimal("n/a"), None);
    }

    #[test]
    fn round_currency_rounds_half_up() {
        let value = BigDecimal::from_str("279.675").expect("literal");
        assert_eq!(
            round_currency(&value),
            BigDecimal::from_str("279.68").expect("literal")
        );
    }
}
