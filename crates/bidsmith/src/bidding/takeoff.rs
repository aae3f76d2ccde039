use serde::{Deserialize, Serialize};

use super::BidLineItem;
use crate::domain::{MaterialCategory, Unit};

const PLYWOOD_SHEETS_PER_SQFT: f64 = 0.032;
const PLYWOOD_REUSES: f64 = 3.0;
const LUMBER_WASTE: f64 = 0.15;
/// Linear feet of each framing size per square foot of form contact area.
const LINEAR_FEET_PER_SQFT: f64 = 0.10;

const BOARD_FEET_PER_LINEAR_FOOT: [(&str, f64); 7] = [
    ("2x4", 0.5),
    ("2x6", 0.75),
    ("2x8", 1.0),
    ("2x10", 1.25),
    ("2x12", 1.5),
    ("4x4", 1.33),
    ("6x6", 3.0),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LumberRequirement {
    pub size: String,
    pub linear_feet: f64,
    pub board_feet: f64,
}

/// Informational lumber estimate for the formwork area of a bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormworkTakeoff {
    pub formwork_area_sqft: f64,
    pub plywood_sheets: u32,
    pub lumber: Vec<LumberRequirement>,
    pub total_board_feet: f64,
}

impl FormworkTakeoff {
    /// `None` when no formwork line item is measured in square feet.
    pub fn from_line_items(items: &[BidLineItem]) -> Option<Self> {
        let area: f64 = items
            .iter()
            .filter(|item| item.category == MaterialCategory::Formwork && item.unit == Unit::Sqft)
            .map(|item| item.quantity)
            .sum();
        (area > 0.0).then(|| Self::for_area(area))
    }

    pub fn for_area(area_sqft: f64) -> Self {
        let sheets = (area_sqft * PLYWOOD_SHEETS_PER_SQFT * (1.0 + LUMBER_WASTE) / PLYWOOD_REUSES).ceil();
        let linear_feet = area_sqft * LINEAR_FEET_PER_SQFT;

        let lumber: Vec<LumberRequirement> = BOARD_FEET_PER_LINEAR_FOOT
            .iter()
            .map(|(size, rate)| LumberRequirement {
                size: size.to_string(),
                linear_feet,
                board_feet: round_tenths(linear_feet * rate * (1.0 + LUMBER_WASTE)),
            })
            .collect();
        let total_board_feet = round_tenths(lumber.iter().map(|entry| entry.board_feet).sum());

        Self {
            formwork_area_sqft: area_sqft,
            plywood_sheets: sheets as u32,
            lumber,
            total_board_feet,
        }
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
