use bigdecimal::{BigDecimal, One, Zero};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

use super::BidLineItem;
use crate::domain::MaterialCategory;
use crate::matching::{DEFAULT_MAX_CANDIDATES, DEFAULT_MIN_SCORE};
use crate::money::{decimal, deserialize_optional_decimal, parse_decimal, round_currency};

pub const DEFAULT_MANUAL_REVIEW_FLOOR: f64 = 0.6;

/// Fatal problems with the pricing configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("pricing configuration is missing required field `{0}`")]
    Missing(&'static str),
    #[error("pricing configuration field `{field}` is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn literal(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap_or_default()
}

/// Waste factor per material category with a fallback for unlisted categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteFactorTable {
    pub by_category: BTreeMap<MaterialCategory, BigDecimal>,
    pub default: BigDecimal,
}

impl WasteFactorTable {
    pub fn standard() -> Self {
        Self {
            by_category: BTreeMap::from([
                (MaterialCategory::Formwork, literal("0.10")),
                (MaterialCategory::Lumber, literal("0.10")),
                (MaterialCategory::Hardware, literal("0.05")),
                (MaterialCategory::Specialty, literal("0.15")),
            ]),
            default: literal("0.08"),
        }
    }

    pub fn factor_for(&self, category: MaterialCategory) -> &BigDecimal {
        self.by_category.get(&category).unwrap_or(&self.default)
    }
}

impl Default for WasteFactorTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Estimated unit prices used when no catalog product matches.
pub fn standard_fallback_prices() -> BTreeMap<MaterialCategory, BigDecimal> {
    BTreeMap::from([
        (MaterialCategory::BridgeBarrier, literal("45.00")),
        (MaterialCategory::Formwork, literal("6.50")),
        (MaterialCategory::Concrete, literal("12.00")),
        (MaterialCategory::TemporaryStructures, literal("3.25")),
        (MaterialCategory::Lumber, literal("2.50")),
        (MaterialCategory::Hardware, literal("1.75")),
        (MaterialCategory::Specialty, literal("85.00")),
    ])
}

/// Inclusive band of unit prices considered normal for a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: BigDecimal,
    pub max: BigDecimal,
}

impl PriceRange {
    pub fn new(min: &str, max: &str) -> Self {
        Self {
            min: literal(min),
            max: literal(max),
        }
    }
}

/// Typical unit prices per category, used to flag suspicious line item prices.
pub fn standard_typical_unit_prices() -> BTreeMap<MaterialCategory, PriceRange> {
    BTreeMap::from([
        (MaterialCategory::BridgeBarrier, PriceRange::new("5.00", "150.00")),
        (MaterialCategory::Formwork, PriceRange::new("1.00", "25.00")),
        (MaterialCategory::Concrete, PriceRange::new("2.00", "250.00")),
        (MaterialCategory::TemporaryStructures, PriceRange::new("0.50", "25.00")),
        (MaterialCategory::Lumber, PriceRange::new("0.25", "15.00")),
        (MaterialCategory::Hardware, PriceRange::new("0.10", "50.00")),
        (MaterialCategory::Specialty, PriceRange::new("5.00", "250.00")),
    ])
}

/// Fully resolved pricing rules for one `assemble` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub markup_percentage: BigDecimal,
    pub delivery_percentage: BigDecimal,
    pub delivery_minimum: BigDecimal,
    pub tax_rate: BigDecimal,
    pub waste_factors: WasteFactorTable,
    pub fallback_unit_prices: BTreeMap<MaterialCategory, BigDecimal>,
    pub typical_unit_prices: BTreeMap<MaterialCategory, PriceRange>,
    pub match_score_threshold: f64,
    pub manual_review_confidence_floor: f64,
    pub max_candidates: usize,
}

impl PricingConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let rates = [
            ("markup_percentage", &self.markup_percentage),
            ("delivery_percentage", &self.delivery_percentage),
            ("delivery_minimum", &self.delivery_minimum),
            ("tax_rate", &self.tax_rate),
            ("waste_factors.default", &self.waste_factors.default),
        ];
        for (field, value) in rates {
            if *value < BigDecimal::zero() {
                return Err(ConfigurationError::Invalid {
                    field,
                    reason: format!("{value} is negative"),
                });
            }
        }
        if self
            .waste_factors
            .by_category
            .values()
            .any(|factor| *factor < BigDecimal::zero())
        {
            return Err(ConfigurationError::Invalid {
                field: "waste_factors",
                reason: "waste factors cannot be negative".to_string(),
            });
        }
        if self
            .fallback_unit_prices
            .values()
            .any(|price| *price < BigDecimal::zero())
        {
            return Err(ConfigurationError::Invalid {
                field: "fallback_unit_prices",
                reason: "fallback prices cannot be negative".to_string(),
            });
        }
        if self
            .typical_unit_prices
            .values()
            .any(|range| range.min < BigDecimal::zero() || range.min > range.max)
        {
            return Err(ConfigurationError::Invalid {
                field: "typical_unit_prices",
                reason: "each range needs 0 <= min <= max".to_string(),
            });
        }
        for (field, value) in [
            ("match_score_threshold", self.match_score_threshold),
            (
                "manual_review_confidence_floor",
                self.manual_review_confidence_floor,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigurationError::Invalid {
                    field,
                    reason: format!("{value} is outside 0.0..=1.0"),
                });
            }
        }
        if self.max_candidates == 0 {
            return Err(ConfigurationError::Invalid {
                field: "max_candidates",
                reason: "at least one candidate is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Pricing options as supplied by a caller; every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingSettings {
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub markup_percentage: Option<BigDecimal>,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub delivery_percentage: Option<BigDecimal>,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub delivery_minimum: Option<BigDecimal>,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub tax_rate: Option<BigDecimal>,
    pub waste_factors: Option<BTreeMap<MaterialCategory, BigDecimal>>,
    #[serde(deserialize_with = "deserialize_optional_decimal")]
    pub default_waste_factor: Option<BigDecimal>,
    pub fallback_unit_prices: Option<BTreeMap<MaterialCategory, BigDecimal>>,
    pub typical_unit_prices: Option<BTreeMap<MaterialCategory, PriceRange>>,
    pub match_score_threshold: Option<f64>,
    pub manual_review_confidence_floor: Option<f64>,
    pub max_candidates: Option<usize>,
}

impl PricingSettings {
    /// The documented defaults.
    pub fn standard() -> Self {
        let waste = WasteFactorTable::standard();
        Self {
            markup_percentage: Some(literal("0.20")),
            delivery_percentage: Some(literal("0.03")),
            delivery_minimum: Some(literal("150.00")),
            tax_rate: Some(literal("0.0825")),
            waste_factors: Some(waste.by_category),
            default_waste_factor: Some(waste.default),
            fallback_unit_prices: Some(standard_fallback_prices()),
            typical_unit_prices: Some(standard_typical_unit_prices()),
            match_score_threshold: Some(DEFAULT_MIN_SCORE),
            manual_review_confidence_floor: Some(DEFAULT_MANUAL_REVIEW_FLOOR),
            max_candidates: Some(DEFAULT_MAX_CANDIDATES),
        }
    }

    /// Applies `BID_MARKUP_PERCENTAGE`, `BID_DELIVERY_PERCENTAGE`, `BID_DELIVERY_MINIMUM`
    /// and `BID_TAX_RATE` when they are set.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigurationError> {
        let overrides: [(&str, &'static str, &mut Option<BigDecimal>); 4] = [
            (
                "BID_MARKUP_PERCENTAGE",
                "markup_percentage",
                &mut self.markup_percentage,
            ),
            (
                "BID_DELIVERY_PERCENTAGE",
                "delivery_percentage",
                &mut self.delivery_percentage,
            ),
            (
                "BID_DELIVERY_MINIMUM",
                "delivery_minimum",
                &mut self.delivery_minimum,
            ),
            ("BID_TAX_RATE", "tax_rate", &mut self.tax_rate),
        ];

        for (variable, field, slot) in overrides {
            let Ok(raw) = env::var(variable) else {
                continue;
            };
            let value = parse_decimal(&raw).ok_or_else(|| ConfigurationError::Invalid {
                field,
                reason: format!("{variable}='{raw}' is not a decimal"),
            })?;
            *slot = Some(value);
        }
        Ok(self)
    }

    /// Fills optional tunables with defaults; the four monetary rates are required.
    pub fn resolve(&self) -> Result<PricingConfig, ConfigurationError> {
        let markup_percentage = self
            .markup_percentage
            .clone()
            .ok_or(ConfigurationError::Missing("markup_percentage"))?;
        let tax_rate = self
            .tax_rate
            .clone()
            .ok_or(ConfigurationError::Missing("tax_rate"))?;
        let delivery_percentage = self
            .delivery_percentage
            .clone()
            .ok_or(ConfigurationError::Missing("delivery_percentage"))?;
        let delivery_minimum = self
            .delivery_minimum
            .clone()
            .ok_or(ConfigurationError::Missing("delivery_minimum"))?;

        let standard_waste = WasteFactorTable::standard();
        let config = PricingConfig {
            markup_percentage,
            delivery_percentage,
            delivery_minimum,
            tax_rate,
            waste_factors: WasteFactorTable {
                by_category: self
                    .waste_factors
                    .clone()
                    .unwrap_or(standard_waste.by_category),
                default: self
                    .default_waste_factor
                    .clone()
                    .unwrap_or(standard_waste.default),
            },
            fallback_unit_prices: self
                .fallback_unit_prices
                .clone()
                .unwrap_or_else(standard_fallback_prices),
            typical_unit_prices: self
                .typical_unit_prices
                .clone()
                .unwrap_or_else(standard_typical_unit_prices),
            match_score_threshold: self.match_score_threshold.unwrap_or(DEFAULT_MIN_SCORE),
            manual_review_confidence_floor: self
                .manual_review_confidence_floor
                .unwrap_or(DEFAULT_MANUAL_REVIEW_FLOOR),
            max_candidates: self.max_candidates.unwrap_or(DEFAULT_MAX_CANDIDATES),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Monetary roll-up of a bid. Recomputable from the line items at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSummary {
    pub subtotal: BigDecimal,
    pub waste_adjustment: BigDecimal,
    pub markup_amount: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub tax_amount: BigDecimal,
    pub total: BigDecimal,
}

impl PricingSummary {
    pub fn zero() -> Self {
        Self {
            subtotal: BigDecimal::zero(),
            waste_adjustment: BigDecimal::zero(),
            markup_amount: BigDecimal::zero(),
            delivery_fee: BigDecimal::zero(),
            tax_amount: BigDecimal::zero(),
            total: BigDecimal::zero(),
        }
    }

    /// Exact summary; no rounding happens here. An empty bid costs nothing, including
    /// delivery.
    pub fn from_line_items(items: &[BidLineItem], config: &PricingConfig) -> Self {
        if items.is_empty() {
            return Self::zero();
        }

        let mut subtotal = BigDecimal::zero();
        let mut waste_adjustment = BigDecimal::zero();
        for item in items {
            let material = decimal(item.quantity) * &item.unit_price;
            waste_adjustment += &material * &item.waste_factor;
            subtotal += material;
        }

        let marked_base = &subtotal + &waste_adjustment;
        let markup_amount = &marked_base * &config.markup_percentage;
        let before_delivery = &marked_base + &markup_amount;

        let percentage_fee = &before_delivery * &config.delivery_percentage;
        let delivery_fee = if percentage_fee > config.delivery_minimum {
            percentage_fee
        } else {
            config.delivery_minimum.clone()
        };

        let taxable = &before_delivery + &delivery_fee;
        let tax_amount = &taxable * &config.tax_rate;
        let total = &taxable + &tax_amount;

        Self {
            subtotal,
            waste_adjustment,
            markup_amount,
            delivery_fee,
            tax_amount,
            total,
        }
    }

    /// Every figure cut to cents for presentation.
    pub fn rounded(&self) -> Self {
        Self {
            subtotal: round_currency(&self.subtotal),
            waste_adjustment: round_currency(&self.waste_adjustment),
            markup_amount: round_currency(&self.markup_amount),
            delivery_fee: round_currency(&self.delivery_fee),
            tax_amount: round_currency(&self.tax_amount),
            total: round_currency(&self.total),
        }
    }
}

/// `quantity * unit_price * (1 + waste) * (1 + markup)`, unrounded.
pub fn line_total(
    quantity: f64,
    unit_price: &BigDecimal,
    waste_factor: &BigDecimal,
    markup_percentage: &BigDecimal,
) -> BigDecimal {
    decimal(quantity)
        * unit_price
        * (BigDecimal::one() + waste_factor)
        * (BigDecimal::one() + markup_percentage)
}
