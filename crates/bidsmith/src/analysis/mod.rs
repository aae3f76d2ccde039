//! Per-document term and quantity extraction.

mod config;
mod dictionary;
mod quality;
mod quantities;
mod strategy;
mod terms;

pub use config::{AnalysisConfig, HighValueThresholds};
pub use dictionary::{TermDefinition, TermDictionary};
pub use strategy::{DocumentStrategy, QuantityPatternSet, StrategySet};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::{
    Alert, AlertKind, AlertLevel, DocumentType, ExtractedQuantity, OfficialBidItem, Priority,
    QuantityId, TermMatch,
};
use crate::matching::ApproximateMatcher;

const PAGE_BREAK: char = '\u{c}';
const QUANTITY_CONTEXT_CHARS: usize = 160;
const TERM_CONTEXT_CHARS: usize = 200;

/// Everything extracted from one readable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub document_type: DocumentType,
    pub terms: Vec<TermMatch>,
    pub quantities: Vec<ExtractedQuantity>,
    pub bid_items: Vec<OfficialBidItem>,
    pub alerts: Vec<Alert>,
    pub local_confidence: f64,
    pub page_count: u32,
    /// Mean quality over non-blank pages.
    pub text_quality: f64,
}

impl DocumentAnalysis {
    pub fn term_names(&self) -> BTreeSet<&str> {
        self.terms.iter().map(|term| term.term.as_str()).collect()
    }

    pub fn matches_for<'s>(&'s self, term: &'s str) -> impl Iterator<Item = &'s TermMatch> + 's {
        self.terms.iter().filter(move |found| found.term == term)
    }

    /// Quantities associated with `term` on any page, in extraction order.
    pub fn quantities_for(&self, term: &str) -> Vec<&ExtractedQuantity> {
        let ids: BTreeSet<&QuantityId> = self
            .matches_for(term)
            .flat_map(|found| found.associated_quantities.iter())
            .collect();
        self.quantities
            .iter()
            .filter(|quantity| ids.contains(&quantity.id))
            .collect()
    }

    /// Highest confidence among the matches for `term`.
    pub fn term_confidence(&self, term: &str) -> Option<f64> {
        self.matches_for(term)
            .map(|found| found.confidence)
            .reduce(f64::max)
    }

    pub fn bid_item_for(&self, quantity_id: &QuantityId) -> Option<&OfficialBidItem> {
        self.bid_items
            .iter()
            .find(|item| &item.quantity_id == quantity_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    MissingDocument,
    ExtractionFailure { detail: String },
}

/// A document that contributed nothing to the combined result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedDocument {
    pub document_type: DocumentType,
    pub reason: SkipReason,
    pub alert: Alert,
}

impl SkippedDocument {
    pub fn missing(document_type: DocumentType) -> Self {
        Self {
            document_type,
            reason: SkipReason::MissingDocument,
            alert: Alert::new(
                AlertLevel::Warning,
                AlertKind::MissingDocument,
                format!("no text supplied for {document_type}; coverage is reduced"),
            )
            .in_document(document_type),
        }
    }

    pub fn failed(document_type: DocumentType, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            document_type,
            alert: Alert::new(
                AlertLevel::Critical,
                AlertKind::ExtractionFailure,
                format!("{document_type} could not be analysed: {detail}"),
            )
            .in_document(document_type),
            reason: SkipReason::ExtractionFailure { detail },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Extracted(DocumentAnalysis),
    Skipped(SkippedDocument),
}

/// Extracts terms, quantities and local alerts from the text of one document.
///
/// Holds only borrowed, immutable configuration, so one extractor may serve any
/// number of documents concurrently.
pub struct DocumentExtractor<'a> {
    dictionary: &'a TermDictionary,
    config: &'a AnalysisConfig,
    matcher: &'a dyn ApproximateMatcher,
}

impl<'a> DocumentExtractor<'a> {
    pub fn new(
        dictionary: &'a TermDictionary,
        config: &'a AnalysisConfig,
        matcher: &'a dyn ApproximateMatcher,
    ) -> Self {
        Self {
            dictionary,
            config,
            matcher,
        }
    }

    pub fn extract(
        &self,
        text: &str,
        document_type: DocumentType,
        strategy: &DocumentStrategy,
    ) -> DocumentOutcome {
        if text.trim().is_empty() {
            return DocumentOutcome::Skipped(SkippedDocument::missing(document_type));
        }
        if !quality::is_readable(text) {
            return DocumentOutcome::Skipped(SkippedDocument::failed(
                document_type,
                "text contains no readable characters",
            ));
        }

        let pages: Vec<&str> = text.split(PAGE_BREAK).collect();
        let mut terms = Vec::new();
        let mut quantities: Vec<ExtractedQuantity> = Vec::new();
        let mut bid_items = Vec::new();
        let mut alerts = Vec::new();
        let mut page_scores = Vec::new();

        for (page_index, page) in pages.iter().enumerate() {
            if page.trim().is_empty() {
                continue;
            }
            let page_number = page_index as u32 + 1;
            let page_quality = quality::page_quality(page);
            page_scores.push(page_quality);

            if page_quality < self.config.page_quality_floor {
                alerts.push(
                    Alert::new(
                        AlertLevel::Warning,
                        AlertKind::LowTextQuality,
                        format!(
                            "text quality {page_quality:.2} on page {page_number} is below {:.2}; analysis may be incomplete",
                            self.config.page_quality_floor
                        ),
                    )
                    .in_document(document_type)
                    .on_page(page_number),
                );
            }

            let lines: Vec<&str> = page.lines().collect();
            let first_on_page = quantities.len();
            let mut bid_row_lines = BTreeSet::new();

            for (line_index, line) in lines.iter().enumerate() {
                let scan = quantities::scan_line(line, strategy.quantity_patterns);
                if scan.quantities.is_empty() {
                    continue;
                }
                let line_number = line_index as u32 + 1;
                if scan.bid_row.is_some() {
                    bid_row_lines.insert(line_number);
                }
                let context = terms::truncate(line.trim(), QUANTITY_CONTEXT_CHARS);
                let in_focus = strategy.mentions_focus_term(&context);

                for found in &scan.quantities {
                    let id = QuantityId::new(document_type, page_number, quantities.len() + 1);
                    let base = base_quantity_confidence(page_quality, found.canonical);
                    let confidence = if in_focus {
                        strategy.boost(base)
                    } else {
                        base
                    };

                    if let Some(row) = scan.bid_row.as_ref() {
                        bid_items.push(OfficialBidItem {
                            item_number: row.item_number.clone(),
                            item_code: row.item_code.clone(),
                            description: row.description.clone(),
                            unit: found.unit,
                            quantity: found.value,
                            quantity_id: id.clone(),
                            page_number,
                        });
                    }

                    quantities.push(ExtractedQuantity {
                        id,
                        value: found.value,
                        unit: found.unit,
                        context: context.clone(),
                        page_number,
                        line_number,
                        confidence,
                        source_document: document_type,
                        term_associated: None,
                    });
                }
            }

            let hits = terms::find_terms(
                &lines,
                self.dictionary,
                self.matcher,
                self.config.term_similarity_threshold,
            );
            let mut associated: Vec<Vec<QuantityId>> = vec![Vec::new(); hits.len()];

            for quantity in &mut quantities[first_on_page..] {
                let distances: Vec<u32> = hits
                    .iter()
                    .map(|hit| hit.distance_to(quantity.line_number))
                    .collect();
                let Some(nearest) = distances.iter().copied().min() else {
                    continue;
                };
                if nearest > self.config.proximity_lines {
                    continue;
                }
                // A bid row's quantity belongs to the row's own description only.
                if nearest > 0 && bid_row_lines.contains(&quantity.line_number) {
                    continue;
                }
                for (index, distance) in distances.into_iter().enumerate() {
                    if distance != nearest {
                        continue;
                    }
                    associated[index].push(quantity.id.clone());
                    if quantity.term_associated.is_none() {
                        quantity.term_associated = Some(hits[index].definition.term.clone());
                    }
                }
            }

            for (hit, associated_quantities) in hits.into_iter().zip(associated) {
                let definition = hit.definition;
                let base = hit.similarity * (0.5 + 0.5 * page_quality);
                let confidence = if strategy.is_focus_term(&definition.term) {
                    strategy.boost(base)
                } else {
                    base.clamp(0.0, 1.0)
                };

                terms.push(TermMatch {
                    term: definition.term.clone(),
                    category: definition.category,
                    priority: definition.priority,
                    context: terms::surrounding_context(&lines, hit.line_number, TERM_CONTEXT_CHARS),
                    page_number,
                    line_number: hit.line_number,
                    confidence,
                    source_document: document_type,
                    associated_quantities,
                    cross_reference: None,
                });
            }
        }

        alerts.extend(self.unquantified_term_alerts(&terms, document_type));
        alerts.extend(self.high_quantity_alerts(&quantities, document_type));

        let critical = alerts
            .iter()
            .filter(|alert| alert.level == AlertLevel::Critical)
            .count();
        let local_confidence = local_confidence(
            terms
                .iter()
                .map(|term| term.confidence)
                .chain(quantities.iter().map(|quantity| quantity.confidence)),
            critical,
            self.config.critical_alert_penalty,
        );
        let text_quality = if page_scores.is_empty() {
            0.0
        } else {
            page_scores.iter().sum::<f64>() / page_scores.len() as f64
        };

        DocumentOutcome::Extracted(DocumentAnalysis {
            document_type,
            terms,
            quantities,
            bid_items,
            alerts,
            local_confidence,
            page_count: pages.len() as u32,
            text_quality,
        })
    }

    fn unquantified_term_alerts(
        &self,
        terms: &[TermMatch],
        document_type: DocumentType,
    ) -> Vec<Alert> {
        let mut reported = BTreeSet::new();
        let mut alerts = Vec::new();

        for found in terms.iter().filter(|found| found.priority == Priority::High) {
            let quantified = terms
                .iter()
                .any(|other| other.term == found.term && !other.associated_quantities.is_empty());
            if quantified || !reported.insert(found.term.as_str()) {
                continue;
            }
            alerts.push(
                Alert::new(
                    AlertLevel::Warning,
                    AlertKind::UnquantifiedTerm,
                    format!("high-priority term {} has no associated quantity", found.term),
                )
                .in_document(document_type)
                .for_term(found.term.clone())
                .on_page(found.page_number),
            );
        }

        alerts
    }

    fn high_quantity_alerts(
        &self,
        quantities: &[ExtractedQuantity],
        document_type: DocumentType,
    ) -> Vec<Alert> {
        quantities
            .iter()
            .filter_map(|quantity| {
                let threshold = self.config.high_value_thresholds.for_unit(quantity.unit);
                let level = if quantity.value > threshold * self.config.critical_value_multiplier {
                    AlertLevel::Critical
                } else if quantity.value > threshold {
                    AlertLevel::High
                } else {
                    return None;
                };

                let mut alert = Alert::new(
                    level,
                    AlertKind::HighQuantity,
                    format!(
                        "quantity {} {} exceeds the {} {} review threshold",
                        quantity.value, quantity.unit, threshold, quantity.unit
                    ),
                )
                .in_document(document_type)
                .for_quantity(quantity);
                if let Some(term) = &quantity.term_associated {
                    alert = alert.for_term(term.clone());
                }
                Some(alert)
            })
            .collect()
    }
}

/// Base score for a quantity: page quality plus a bonus for a standard unit abbreviation.
fn base_quantity_confidence(page_quality: f64, canonical_unit: bool) -> f64 {
    let bonus = if canonical_unit { 0.2 } else { 0.0 };
    (0.3 + 0.5 * page_quality + bonus).clamp(0.0, 1.0)
}

fn local_confidence(scores: impl Iterator<Item = f64>, critical: usize, penalty: f64) -> f64 {
    let (sum, count) = scores.fold((0.0, 0usize), |(sum, count), score| (sum + score, count + 1));
    if count == 0 {
        return 0.0;
    }
    let mean = (sum / count as f64).clamp(0.0, 1.0);
    (mean - penalty * critical as f64).clamp(0.0, 1.0)
}
