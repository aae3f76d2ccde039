use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::DocumentType;
use crate::matching::normalize;

/// Named group of quantity patterns applied to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityPatternSet {
    /// `<value> <unit>` in prose.
    Standard,
    /// Standard plus bid-schedule rows and `<unit> <value>` columns.
    BidSchedule,
    /// Standard plus parenthesised callout counts such as `(24) BALUSTERS`.
    PlanCallout,
}

/// Per document-type extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStrategy {
    pub document_type: DocumentType,
    pub focus_terms: Vec<String>,
    pub confidence_boost: f64,
    pub extraction_priority: u8,
    pub quantity_patterns: QuantityPatternSet,
}

impl DocumentStrategy {
    /// True when `text` mentions one of the focus terms.
    pub fn mentions_focus_term(&self, text: &str) -> bool {
        let haystack = format!(" {} ", normalize(text));
        self.focus_terms
            .iter()
            .map(|term| normalize(term))
            .filter(|needle| !needle.is_empty())
            .any(|needle| haystack.contains(&format!(" {needle}")))
    }

    pub fn is_focus_term(&self, term: &str) -> bool {
        self.focus_terms.iter().any(|focus| focus == term)
    }

    /// Applies the boost and saturates at 1.0.
    pub fn boost(&self, confidence: f64) -> f64 {
        (confidence * self.confidence_boost).clamp(0.0, 1.0)
    }
}

/// Strategies for every document type; immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySet {
    strategies: BTreeMap<DocumentType, DocumentStrategy>,
}

impl StrategySet {
    pub fn new(strategies: impl IntoIterator<Item = DocumentStrategy>) -> Self {
        Self {
            strategies: strategies
                .into_iter()
                .map(|strategy| (strategy.document_type, strategy))
                .collect(),
        }
    }

    pub fn standard() -> Self {
        fn terms(values: &[&str]) -> Vec<String> {
            values.iter().map(|value| value.to_string()).collect()
        }

        Self::new([
            DocumentStrategy {
                document_type: DocumentType::Specifications,
                focus_terms: terms(&[
                    "BALUSTER",
                    "FORMWORK",
                    "FALSEWORK",
                    "FORM_FACING",
                    "STAMPED_CONCRETE",
                    "ARCHITECTURAL_TREATMENT",
                ]),
                confidence_boost: 1.2,
                extraction_priority: 1,
                quantity_patterns: QuantityPatternSet::Standard,
            },
            DocumentStrategy {
                document_type: DocumentType::BidForms,
                focus_terms: terms(&[
                    "BALUSTER",
                    "BRIDGE_RAILING",
                    "TYPE_86H_RAIL",
                    "RETAINING_WALL",
                    "EROSION_CONTROL",
                ]),
                confidence_boost: 1.3,
                extraction_priority: 2,
                quantity_patterns: QuantityPatternSet::BidSchedule,
            },
            DocumentStrategy {
                document_type: DocumentType::ConstructionPlans,
                focus_terms: terms(&[
                    "BLOCKOUT",
                    "FRACTURED_RIB_TEXTURE",
                    "RETAINING_WALL",
                    "FORM_FACING",
                ]),
                confidence_boost: 1.1,
                extraction_priority: 3,
                quantity_patterns: QuantityPatternSet::PlanCallout,
            },
            DocumentStrategy {
                document_type: DocumentType::Supplemental,
                focus_terms: terms(&["EROSION_CONTROL", "TEMPORARY_STRUCTURES", "CRIBBING"]),
                confidence_boost: 1.0,
                extraction_priority: 4,
                quantity_patterns: QuantityPatternSet::Standard,
            },
        ])
    }

    pub fn get(&self, document_type: DocumentType) -> Option<&DocumentStrategy> {
        self.strategies.get(&document_type)
    }

    /// Strategy for `document_type`, or a neutral one when none is configured.
    pub fn resolve(&self, document_type: DocumentType) -> DocumentStrategy {
        self.get(document_type)
            .cloned()
            .unwrap_or_else(|| DocumentStrategy {
                document_type,
                focus_terms: Vec::new(),
                confidence_boost: 1.0,
                extraction_priority: u8::MAX,
                quantity_patterns: QuantityPatternSet::Standard,
            })
    }

    /// Document types sorted by `extraction_priority`.
    pub fn processing_order(&self) -> Vec<DocumentType> {
        let mut order: Vec<(u8, DocumentType)> = DocumentType::ordered()
            .into_iter()
            .map(|document_type| (self.resolve(document_type).extraction_priority, document_type))
            .collect();
        order.sort();
        order.into_iter().map(|(_, document_type)| document_type).collect()
    }

    /// Weight of a document type when combining per-document confidences.
    pub fn weight(&self, document_type: DocumentType) -> f64 {
        self.get(document_type)
            .map(|strategy| strategy.confidence_boost)
            .unwrap_or(1.0)
    }
}

impl Default for StrategySet {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_order_follows_priority() {
        let order = StrategySet::standard().processing_order();
        assert_eq!(
            order,
            vec![
                DocumentType::Specifications,
                DocumentType::BidForms,
                DocumentType::ConstructionPlans,
                DocumentType::Supplemental,
            ]
        );
    }

    #[test]
    fn boost_saturates_at_one() {
        let strategy = StrategySet::standard().resolve(DocumentType::BidForms);
        assert_eq!(strategy.boost(0.9), 1.0);
        assert!((strategy.boost(0.5) - 0.65).abs() < 1e-9);
    }

    #[test]
    fn focus_terms_match_on_word_boundaries() {
        let strategy = StrategySet::standard().resolve(DocumentType::Specifications);
        assert!(strategy.mentions_focus_term("Install 100 EA baluster units"));
        assert!(strategy.mentions_focus_term("stamped concrete finish, 400 SF"));
        assert!(!strategy.mentions_focus_term("unbalustered 10 LF"));
    }
}
