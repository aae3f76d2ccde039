//! Compares per-document findings across document types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::analysis::{AnalysisConfig, DocumentAnalysis};
use crate::domain::{
    Alert, AlertKind, AlertLevel, CrossReferenceTag, DocumentType, TermStatus, Unit,
};

/// Bid-form quantity that disagrees with another document beyond the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityDiscrepancy {
    pub term: String,
    pub unit: Unit,
    /// The authoritative document first, then the disagreeing one.
    pub documents: Vec<DocumentType>,
    pub values: Vec<f64>,
    pub difference_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementGap {
    /// Found only in plans or supplemental notices, never in the specifications.
    ScopeAddition,
    /// Quantified elsewhere while the bid forms carry no quantity.
    MissingBidQuantity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingRequirement {
    pub term: String,
    pub present_in: Vec<DocumentType>,
    pub missing_from: DocumentType,
    pub gap: RequirementGap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossReferenceResult {
    pub term_consistency: BTreeMap<String, Vec<DocumentType>>,
    pub quantity_discrepancies: Vec<QuantityDiscrepancy>,
    pub missing_requirements: Vec<MissingRequirement>,
    pub scope_additions: Vec<String>,
    pub document_coverage: BTreeMap<DocumentType, f64>,
    pub confidence_scores: BTreeMap<DocumentType, f64>,
    pub alerts: Vec<Alert>,
}

impl CrossReferenceResult {
    pub fn documents_for(&self, term: &str) -> &[DocumentType] {
        self.term_consistency
            .get(term)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn discrepancies_for<'s>(
        &'s self,
        term: &'s str,
    ) -> impl Iterator<Item = &'s QuantityDiscrepancy> + 's {
        self.quantity_discrepancies
            .iter()
            .filter(move |discrepancy| discrepancy.term == term)
    }

    pub fn is_scope_addition(&self, term: &str) -> bool {
        self.scope_additions.iter().any(|addition| addition == term)
    }

    pub fn lacks_bid_quantity(&self, term: &str) -> bool {
        self.missing_requirements
            .iter()
            .any(|gap| gap.term == term && gap.gap == RequirementGap::MissingBidQuantity)
    }

    /// Project-level tag for a term, or `None` when no document mentions it.
    pub fn tag_for(&self, term: &str) -> Option<CrossReferenceTag> {
        let documents = self.term_consistency.get(term)?;
        let status = if self.discrepancies_for(term).next().is_some() {
            TermStatus::Discrepancy
        } else if self.is_scope_addition(term) {
            TermStatus::ScopeAddition
        } else if documents.len() > 1 {
            TermStatus::Consistent
        } else {
            TermStatus::SingleSource
        };

        Some(CrossReferenceTag {
            documents: documents.clone(),
            status,
        })
    }
}

/// Stateless comparison over completed document analyses. The result depends only on
/// its inputs.
pub struct CrossReferenceEngine<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> CrossReferenceEngine<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn cross_reference(
        &self,
        results: &BTreeMap<DocumentType, DocumentAnalysis>,
    ) -> CrossReferenceResult {
        let term_consistency = term_consistency(results);
        let mut alerts = Vec::new();

        let quantity_discrepancies = self.quantity_discrepancies(results);
        for discrepancy in &quantity_discrepancies {
            alerts.push(
                Alert::new(
                    AlertLevel::High,
                    AlertKind::QuantityDiscrepancy,
                    format!(
                        "{} quantities differ by {:.1}%: {} {} in {} vs {} {} in {}",
                        discrepancy.term,
                        discrepancy.difference_percent * 100.0,
                        discrepancy.values[0],
                        discrepancy.unit,
                        discrepancy.documents[0],
                        discrepancy.values[1],
                        discrepancy.unit,
                        discrepancy.documents[1],
                    ),
                )
                .for_term(discrepancy.term.clone()),
            );
        }

        let mut missing_requirements = Vec::new();
        let mut scope_additions = Vec::new();
        for (term, documents) in &term_consistency {
            let outside_specifications = documents.iter().all(|document| {
                matches!(
                    document,
                    DocumentType::Supplemental | DocumentType::ConstructionPlans
                )
            });
            if !documents.is_empty() && outside_specifications {
                scope_additions.push(term.clone());
                missing_requirements.push(MissingRequirement {
                    term: term.clone(),
                    present_in: documents.clone(),
                    missing_from: DocumentType::Specifications,
                    gap: RequirementGap::ScopeAddition,
                });
                alerts.push(
                    Alert::new(
                        AlertLevel::Info,
                        AlertKind::ScopeAddition,
                        format!(
                            "{term} appears only in {}; possible scope addition not covered by the specifications",
                            join_documents(documents)
                        ),
                    )
                    .for_term(term.clone()),
                );
            }
        }

        if let Some(official) = results.get(&DocumentType::BidForms) {
            for term in term_consistency.keys() {
                if !official.quantities_for(term).is_empty() {
                    continue;
                }
                let quantified_in: Vec<DocumentType> = results
                    .iter()
                    .filter(|(document_type, analysis)| {
                        **document_type != DocumentType::BidForms
                            && !analysis.quantities_for(term).is_empty()
                    })
                    .map(|(document_type, _)| *document_type)
                    .collect();
                if quantified_in.is_empty() {
                    continue;
                }

                alerts.push(
                    Alert::new(
                        AlertLevel::Warning,
                        AlertKind::MissingBidQuantity,
                        format!(
                            "{term} is quantified in {} but has no bid form quantity",
                            join_documents(&quantified_in)
                        ),
                    )
                    .in_document(DocumentType::BidForms)
                    .for_term(term.clone()),
                );
                missing_requirements.push(MissingRequirement {
                    term: term.clone(),
                    present_in: quantified_in,
                    missing_from: DocumentType::BidForms,
                    gap: RequirementGap::MissingBidQuantity,
                });
            }
        }

        let document_coverage = document_coverage(results, &term_consistency);
        let confidence_scores = self.confidence_scores(results, &document_coverage);

        debug!(
            terms = term_consistency.len(),
            discrepancies = quantity_discrepancies.len(),
            missing = missing_requirements.len(),
            "cross reference complete"
        );

        CrossReferenceResult {
            term_consistency,
            quantity_discrepancies,
            missing_requirements,
            scope_additions,
            document_coverage,
            confidence_scores,
            alerts,
        }
    }

    fn quantity_discrepancies(
        &self,
        results: &BTreeMap<DocumentType, DocumentAnalysis>,
    ) -> Vec<QuantityDiscrepancy> {
        let Some(official) = results.get(&DocumentType::BidForms) else {
            return Vec::new();
        };

        let mut discrepancies = Vec::new();
        for term in official.term_names() {
            let official_values = max_by_unit(official, term);
            if official_values.is_empty() {
                continue;
            }

            for (document_type, analysis) in results {
                if *document_type == DocumentType::BidForms {
                    continue;
                }
                for (unit, other) in max_by_unit(analysis, term) {
                    let Some(&governing) = official_values.get(&unit) else {
                        continue;
                    };
                    let difference_percent = difference_percent(governing, other);
                    if difference_percent > self.config.discrepancy_threshold {
                        discrepancies.push(QuantityDiscrepancy {
                            term: term.to_string(),
                            unit,
                            documents: vec![DocumentType::BidForms, *document_type],
                            values: vec![governing, other],
                            difference_percent,
                        });
                    }
                }
            }
        }
        discrepancies
    }

    fn confidence_scores(
        &self,
        results: &BTreeMap<DocumentType, DocumentAnalysis>,
        coverage: &BTreeMap<DocumentType, f64>,
    ) -> BTreeMap<DocumentType, f64> {
        results
            .iter()
            .map(|(document_type, analysis)| {
                let others: Vec<f64> = results
                    .keys()
                    .filter(|other| *other != document_type)
                    .map(|other| coverage.get(other).copied().unwrap_or(0.0))
                    .collect();
                let own = coverage.get(document_type).copied().unwrap_or(0.0);

                let mut score = analysis.local_confidence;
                if !others.is_empty() {
                    let average = others.iter().sum::<f64>() / others.len() as f64;
                    if average > 0.0 && own < self.config.coverage_downweight_ratio * average {
                        score *= self.config.coverage_downweight_factor;
                    }
                }
                (*document_type, score.clamp(0.0, 1.0))
            })
            .collect()
    }
}

fn term_consistency(
    results: &BTreeMap<DocumentType, DocumentAnalysis>,
) -> BTreeMap<String, Vec<DocumentType>> {
    let mut consistency: BTreeMap<String, Vec<DocumentType>> = BTreeMap::new();
    for (document_type, analysis) in results {
        for term in analysis.term_names() {
            consistency
                .entry(term.to_string())
                .or_default()
                .push(*document_type);
        }
    }
    consistency
}

/// Coverage for every document type; types that were not analysed score zero.
fn document_coverage(
    results: &BTreeMap<DocumentType, DocumentAnalysis>,
    consistency: &BTreeMap<String, Vec<DocumentType>>,
) -> BTreeMap<DocumentType, f64> {
    let union = consistency.len();
    DocumentType::ordered()
        .into_iter()
        .map(|document_type| {
            let found = results
                .get(&document_type)
                .map(|analysis| analysis.term_names().len())
                .unwrap_or(0);
            let coverage = if union == 0 {
                0.0
            } else {
                found as f64 / union as f64
            };
            (document_type, coverage)
        })
        .collect()
}

fn max_by_unit(analysis: &DocumentAnalysis, term: &str) -> BTreeMap<Unit, f64> {
    let mut values: BTreeMap<Unit, f64> = BTreeMap::new();
    for quantity in analysis.quantities_for(term) {
        values
            .entry(quantity.unit)
            .and_modify(|current| *current = current.max(quantity.value))
            .or_insert(quantity.value);
    }
    values
}

/// `|official - other| / official`; a zero official quantity against any other value
/// counts as a full difference.
pub fn difference_percent(official: f64, other: f64) -> f64 {
    if official == 0.0 {
        return if other == 0.0 { 0.0 } else { 1.0 };
    }
    (official - other).abs() / official
}

fn join_documents(documents: &[DocumentType]) -> String {
    let labels: BTreeSet<&str> = documents.iter().map(|document| document.label()).collect();
    labels.into_iter().collect::<Vec<_>>().join(", ")
}
