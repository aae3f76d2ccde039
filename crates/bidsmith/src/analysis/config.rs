use serde::{Deserialize, Serialize};

use crate::domain::Unit;

/// Tunables for extraction and cross-referencing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub term_similarity_threshold: f64,
    pub discrepancy_threshold: f64,
    pub high_value_thresholds: HighValueThresholds,
    /// Quantities above this multiple of the unit threshold raise a critical alert.
    pub critical_value_multiplier: f64,
    pub page_quality_floor: f64,
    pub proximity_lines: u32,
    pub critical_alert_penalty: f64,
    pub coverage_downweight_ratio: f64,
    pub coverage_downweight_factor: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            term_similarity_threshold: 0.8,
            discrepancy_threshold: 0.10,
            high_value_thresholds: HighValueThresholds::default(),
            critical_value_multiplier: 10.0,
            page_quality_floor: 0.5,
            proximity_lines: 2,
            critical_alert_penalty: 0.1,
            coverage_downweight_ratio: 0.5,
            coverage_downweight_factor: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighValueThresholds {
    pub sqft: f64,
    pub lf: f64,
    pub cy: f64,
    pub ea: f64,
    pub ton: f64,
    pub gal: f64,
    pub lb: f64,
}

impl HighValueThresholds {
    pub fn for_unit(&self, unit: Unit) -> f64 {
        match unit {
            Unit::Sqft => self.sqft,
            Unit::Lf => self.lf,
            Unit::Cy => self.cy,
            Unit::Ea => self.ea,
            Unit::Ton => self.ton,
            Unit::Gal => self.gal,
            Unit::Lb => self.lb,
        }
    }
}

impl Default for HighValueThresholds {
    fn default() -> Self {
        Self {
            sqft: 10_000.0,
            lf: 5_000.0,
            cy: 1_000.0,
            ea: 500.0,
            ton: 100.0,
            gal: 10_000.0,
            lb: 50_000.0,
        }
    }
}
