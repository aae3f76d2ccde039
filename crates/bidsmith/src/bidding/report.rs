use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{BidLineItem, PriceSource, PricingConfig, PricingSummary};
use crate::analysis::SkipReason;
use crate::crossref::{QuantityDiscrepancy, RequirementGap};
use crate::domain::DocumentType;
use crate::matching::CatalogIssue;
use crate::money::round_currency;
use crate::pipeline::ProjectAnalysis;

const LOW_COVERAGE: f64 = 0.3;
const CONFIDENCE_WEIGHT: f64 = 0.6;
const COMPLETENESS_WEIGHT: f64 = 0.4;

/// Letter grade for the bid as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
    F,
}

impl QualityGrade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 0.9 => Self::A,
            s if s >= 0.8 => Self::B,
            s if s >= 0.7 => Self::C,
            s if s >= 0.6 => Self::D,
            _ => Self::F,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::A => "Excellent",
            Self::B => "Good",
            Self::C => "Fair",
            Self::D => "Poor",
            Self::F => "Inadequate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualReviewItem {
    /// Line item number, absent for terms that never became a line item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_number: Option<String>,
    pub term: String,
    pub confidence: f64,
    pub reasons: Vec<String>,
}

/// A price or total that looks wrong on its face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingWarning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_number: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub overall_confidence: f64,
    /// Share of the project's document types that were analysed.
    pub completeness: f64,
    /// `0.6 * overall_confidence + 0.4 * completeness`.
    pub quality_score: f64,
    pub quality_grade: QualityGrade,
    pub document_coverage: BTreeMap<DocumentType, f64>,
    pub discrepancies: Vec<QuantityDiscrepancy>,
    pub recommendations: Vec<String>,
    pub manual_review_items: Vec<ManualReviewItem>,
    pub pricing_warnings: Vec<PricingWarning>,
    pub catalog_issues: Vec<CatalogIssue>,
}

impl ConfidenceReport {
    pub(crate) fn build(
        analysis: &ProjectAnalysis,
        line_items: &[BidLineItem],
        summary: &PricingSummary,
        unquantified_terms: &[(String, f64)],
        catalog_issues: &[CatalogIssue],
        config: &PricingConfig,
    ) -> Self {
        let overall_confidence = if line_items.is_empty() {
            analysis.overall_confidence
        } else {
            quantity_weighted_confidence(line_items)
        };
        let completeness =
            analysis.documents.len() as f64 / DocumentType::ordered().len() as f64;
        let quality_score =
            CONFIDENCE_WEIGHT * overall_confidence + COMPLETENESS_WEIGHT * completeness;
        let manual_review_items = manual_review_items(line_items, unquantified_terms, config);
        let pricing_warnings = pricing_warnings(line_items, summary, config);
        let recommendations = recommendations(
            analysis,
            line_items,
            overall_confidence,
            pricing_warnings.len(),
            config,
        );

        Self {
            overall_confidence,
            completeness,
            quality_score,
            quality_grade: QualityGrade::from_score(quality_score),
            document_coverage: analysis.cross_reference.document_coverage.clone(),
            discrepancies: analysis.cross_reference.quantity_discrepancies.clone(),
            recommendations,
            manual_review_items,
            pricing_warnings,
            catalog_issues: catalog_issues.to_vec(),
        }
    }
}

/// Line-item confidences weighted by quantity; a plain mean when every quantity is zero.
fn quantity_weighted_confidence(items: &[BidLineItem]) -> f64 {
    let weight: f64 = items.iter().map(|item| item.quantity).sum();
    let mean = if weight > 0.0 {
        items
            .iter()
            .map(|item| item.confidence * item.quantity)
            .sum::<f64>()
            / weight
    } else {
        items.iter().map(|item| item.confidence).sum::<f64>() / items.len() as f64
    };
    mean.clamp(0.0, 1.0)
}

fn manual_review_items(
    items: &[BidLineItem],
    unquantified_terms: &[(String, f64)],
    config: &PricingConfig,
) -> Vec<ManualReviewItem> {
    let mut review: Vec<ManualReviewItem> = items
        .iter()
        .filter_map(|item| {
            let mut reasons = Vec::new();
            if item.confidence < config.manual_review_confidence_floor {
                reasons.push(format!(
                    "confidence {:.2} is below the {:.2} review floor",
                    item.confidence, config.manual_review_confidence_floor
                ));
            }
            match item.price_source {
                PriceSource::Catalog => {}
                PriceSource::CategoryDefault => {
                    reasons.push("no catalog match; priced from the category default".to_string())
                }
                PriceSource::Unpriced => reasons
                    .push("no catalog match and no category default; price manually".to_string()),
            }

            (!reasons.is_empty()).then(|| ManualReviewItem {
                item_number: Some(item.item_number.clone()),
                term: item.source_term.clone(),
                confidence: item.confidence,
                reasons,
            })
        })
        .collect();

    review.extend(
        unquantified_terms
            .iter()
            .map(|(term, confidence)| ManualReviewItem {
                item_number: None,
                term: term.clone(),
                confidence: *confidence,
                reasons: vec!["found in the documents without any quantity".to_string()],
            }),
    );
    review
}

/// Negative amounts, a total more than double the material subtotal, and unit prices
/// outside the category's typical range.
fn pricing_warnings(
    items: &[BidLineItem],
    summary: &PricingSummary,
    config: &PricingConfig,
) -> Vec<PricingWarning> {
    let mut warnings = Vec::new();
    let whole_bid = |message: String| PricingWarning {
        item_number: None,
        message,
    };

    for (label, amount) in [("Subtotal", &summary.subtotal), ("Total", &summary.total)] {
        if *amount < BigDecimal::zero() {
            warnings.push(whole_bid(format!(
                "{label} is negative (${})",
                round_currency(amount)
            )));
        }
    }
    if summary.subtotal > BigDecimal::zero() {
        let added = &summary.total - &summary.subtotal;
        if added > summary.subtotal {
            warnings.push(whole_bid("Markup appears excessive (>100%)".to_string()));
        }
    }

    for item in items {
        if item.price_source == PriceSource::Unpriced {
            continue;
        }
        let Some(range) = config.typical_unit_prices.get(&item.category) else {
            continue;
        };
        let verdict = if item.unit_price < range.min {
            "low"
        } else if item.unit_price > range.max {
            "high"
        } else {
            continue;
        };
        warnings.push(PricingWarning {
            item_number: Some(item.item_number.clone()),
            message: format!(
                "Unit price ${} for {} seems {verdict}, typical range ${}-${}",
                round_currency(&item.unit_price),
                item.description,
                round_currency(&range.min),
                round_currency(&range.max)
            ),
        });
    }
    warnings
}

fn recommendations(
    analysis: &ProjectAnalysis,
    items: &[BidLineItem],
    overall_confidence: f64,
    pricing_warnings: usize,
    config: &PricingConfig,
) -> Vec<String> {
    let mut recommendations = Vec::new();
    let cross_reference = &analysis.cross_reference;

    for document_type in DocumentType::ordered() {
        let skipped = analysis
            .skipped
            .iter()
            .find(|skipped| skipped.document_type == document_type);
        match skipped.map(|skipped| &skipped.reason) {
            Some(SkipReason::MissingDocument) => recommendations.push(format!(
                "No {document_type} text was supplied; obtain it before finalising the bid"
            )),
            Some(SkipReason::ExtractionFailure { detail }) => recommendations.push(format!(
                "{document_type} could not be analysed ({detail}); re-extract the document text"
            )),
            None => {
                let coverage = cross_reference
                    .document_coverage
                    .get(&document_type)
                    .copied()
                    .unwrap_or(0.0);
                if analysis.analysis(document_type).is_some() && coverage < LOW_COVERAGE {
                    recommendations.push(format!(
                        "Low coverage in {document_type} ({:.0}% of project terms); verify the extraction is complete",
                        coverage * 100.0
                    ));
                }
            }
        }
    }

    let discrepancies = cross_reference.quantity_discrepancies.len();
    if discrepancies > 0 {
        let noun = if discrepancies == 1 {
            "discrepancy"
        } else {
            "discrepancies"
        };
        recommendations.push(format!(
            "Resolve {discrepancies} quantity {noun} against the bid forms before submission"
        ));
    }

    let missing_bid: Vec<&str> = cross_reference
        .missing_requirements
        .iter()
        .filter(|gap| gap.gap == RequirementGap::MissingBidQuantity)
        .map(|gap| gap.term.as_str())
        .collect();
    if !missing_bid.is_empty() {
        recommendations.push(format!(
            "Confirm quantities for {} which have no bid form quantity",
            missing_bid.join(", ")
        ));
    }

    if !cross_reference.scope_additions.is_empty() {
        recommendations.push(format!(
            "Review possible scope additions not in the specifications: {}",
            cross_reference.scope_additions.join(", ")
        ));
    }

    let count = |source: PriceSource| items.iter().filter(|item| item.price_source == source).count();
    let fallback = count(PriceSource::CategoryDefault);
    if fallback > 0 {
        recommendations.push(format!(
            "{fallback} line item(s) priced from category defaults; obtain supplier quotes"
        ));
    }
    let unpriced = count(PriceSource::Unpriced);
    if unpriced > 0 {
        recommendations.push(format!(
            "{unpriced} line item(s) have no price; price them manually"
        ));
    }

    if pricing_warnings > 0 {
        recommendations.push(format!(
            "Check {pricing_warnings} pricing warning(s) before submission"
        ));
    }

    if overall_confidence < config.manual_review_confidence_floor {
        recommendations.push(format!(
            "Overall confidence {:.0}% is below the {:.0}% review floor; review the whole bid",
            overall_confidence * 100.0,
            config.manual_review_confidence_floor * 100.0
        ));
    }

    if recommendations.is_empty() {
        recommendations.push("No blocking issues detected".to_string());
    }
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidding::PricingSettings;
    use crate::domain::{MaterialCategory, Priority, Unit};
    use crate::pipeline::{ProjectAnalyzer, ProjectDocuments};
    use std::str::FromStr;

    fn amount(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).expect("decimal literal")
    }

    fn pricing() -> PricingConfig {
        PricingSettings::standard()
            .resolve()
            .expect("standard pricing resolves")
    }

    fn item(number: &str, quantity: f64, unit_price: &str, confidence: f64) -> BidLineItem {
        BidLineItem {
            item_number: number.to_string(),
            description: "Baluster".to_string(),
            source_term: "BALUSTER".to_string(),
            category: MaterialCategory::BridgeBarrier,
            priority: Priority::High,
            quantity,
            unit: Unit::Ea,
            unit_price: amount(unit_price),
            total_price: BigDecimal::zero(),
            waste_factor: amount("0.08"),
            markup_percentage: amount("0.20"),
            delivery_fee_share: BigDecimal::zero(),
            confidence,
            source_documents: vec![DocumentType::BidForms],
            cross_reference_notes: Vec::new(),
            price_source: PriceSource::Catalog,
            product: None,
            official_item_number: None,
        }
    }

    fn two_document_project() -> ProjectAnalysis {
        let documents = ProjectDocuments::from([
            (
                DocumentType::Specifications,
                "Formwork.\nFalsework.\nErosion control.\nCribbing.".to_string(),
            ),
            (DocumentType::Supplemental, "Formwork.".to_string()),
        ]);
        ProjectAnalyzer::standard().analyze(&documents)
    }

    #[test]
    fn confidence_is_weighted_by_quantity() {
        let items = [item("001", 100.0, "25", 0.9), item("002", 300.0, "25", 0.5)];
        assert!((quantity_weighted_confidence(&items) - 0.6).abs() < 1e-12);

        let unquantified = [item("001", 0.0, "25", 0.9), item("002", 0.0, "25", 0.5)];
        assert!((quantity_weighted_confidence(&unquantified) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn grade_combines_confidence_and_completeness() {
        let config = pricing();
        let project = two_document_project();
        let items = vec![item("001", 100.0, "25", 0.9), item("002", 300.0, "25", 0.5)];
        let summary = PricingSummary::from_line_items(&items, &config);

        let report = ConfidenceReport::build(&project, &items, &summary, &[], &[], &config);
        assert!((report.overall_confidence - 0.6).abs() < 1e-12);
        assert_eq!(report.completeness, 0.5);
        assert!((report.quality_score - 0.56).abs() < 1e-9);
        assert_eq!(report.quality_grade, QualityGrade::F);
        assert_eq!(report.quality_grade.label(), "Inadequate");
    }

    #[test]
    fn grade_boundaries() {
        assert_eq!(QualityGrade::from_score(0.95), QualityGrade::A);
        assert_eq!(QualityGrade::from_score(0.9), QualityGrade::A);
        assert_eq!(QualityGrade::from_score(0.89), QualityGrade::B);
        assert_eq!(QualityGrade::from_score(0.8), QualityGrade::B);
        assert_eq!(QualityGrade::from_score(0.7), QualityGrade::C);
        assert_eq!(QualityGrade::from_score(0.6), QualityGrade::D);
        assert_eq!(QualityGrade::from_score(0.59), QualityGrade::F);
        assert_eq!(QualityGrade::B.label(), "Good");
    }

    #[test]
    fn thin_documents_get_a_low_coverage_recommendation() {
        let config = pricing();
        let project = two_document_project();
        assert_eq!(
            project
                .cross_reference
                .document_coverage
                .get(&DocumentType::Supplemental)
                .copied(),
            Some(0.25)
        );

        let report =
            ConfidenceReport::build(&project, &[], &PricingSummary::zero(), &[], &[], &config);
        assert!(report.recommendations.contains(
            &"Low coverage in supplemental (25% of project terms); verify the extraction is complete"
                .to_string()
        ));
        assert!(!report
            .recommendations
            .iter()
            .any(|text| text.starts_with("Low coverage in specifications")));
    }

    #[test]
    fn review_floor_alone_flags_a_catalog_priced_item() {
        let config = pricing();
        let mut fallback = item("003", 10.0, "45", 0.9);
        fallback.price_source = PriceSource::CategoryDefault;
        let items = [
            item("001", 10.0, "25", 0.55),
            item("002", 10.0, "25", 0.6),
            fallback,
        ];

        let review = manual_review_items(&items, &[], &config);
        assert_eq!(review.len(), 2);
        assert_eq!(review[0].item_number.as_deref(), Some("001"));
        assert_eq!(
            review[0].reasons,
            vec!["confidence 0.55 is below the 0.60 review floor".to_string()]
        );
        assert_eq!(review[1].item_number.as_deref(), Some("003"));
        assert_eq!(
            review[1].reasons,
            vec!["no catalog match; priced from the category default".to_string()]
        );
    }

    #[test]
    fn delivery_uses_the_percentage_above_the_minimum() {
        let config = pricing();
        let items = [item("001", 400.0, "25", 0.9)];
        let summary = PricingSummary::from_line_items(&items, &config);

        assert_eq!(summary.subtotal, amount("10000"));
        assert_eq!(summary.waste_adjustment, amount("800"));
        assert_eq!(summary.markup_amount, amount("2160"));
        // 0.03 * 12960 clears the 150 minimum
        assert_eq!(summary.delivery_fee, amount("388.80"));
        assert_eq!(summary.tax_amount, amount("1101.276"));
        assert_eq!(summary.total, amount("14450.076"));
        assert!(pricing_warnings(&items, &summary, &config).is_empty());
    }

    #[test]
    fn unit_prices_outside_the_typical_range_warn() {
        let config = pricing();
        let mut unpriced = item("004", 100.0, "0", 0.5);
        unpriced.price_source = PriceSource::Unpriced;
        let items = [
            item("001", 100.0, "0.50", 0.9),
            item("002", 100.0, "200", 0.9),
            item("003", 100.0, "25", 0.9),
            unpriced,
        ];
        let summary = PricingSummary::from_line_items(&items, &config);

        let warnings = pricing_warnings(&items, &summary, &config);
        assert_eq!(
            warnings,
            vec![
                PricingWarning {
                    item_number: Some("001".to_string()),
                    message: "Unit price $0.50 for Baluster seems low, typical range $5.00-$150.00"
                        .to_string(),
                },
                PricingWarning {
                    item_number: Some("002".to_string()),
                    message:
                        "Unit price $200.00 for Baluster seems high, typical range $5.00-$150.00"
                            .to_string(),
                },
            ]
        );
    }

    #[test]
    fn totals_are_checked_for_sign_and_excessive_markup() {
        let config = pricing();
        let inflated = PricingSummary {
            subtotal: amount("100"),
            total: amount("250"),
            ..PricingSummary::zero()
        };
        let warnings = pricing_warnings(&[], &inflated, &config);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "Markup appears excessive (>100%)");
        assert!(warnings[0].item_number.is_none());

        let doubled = PricingSummary {
            subtotal: amount("100"),
            total: amount("200"),
            ..PricingSummary::zero()
        };
        assert!(pricing_warnings(&[], &doubled, &config).is_empty());

        let negative = PricingSummary {
            subtotal: amount("-10"),
            total: amount("-5"),
            ..PricingSummary::zero()
        };
        let messages: Vec<String> = pricing_warnings(&[], &negative, &config)
            .into_iter()
            .map(|warning| warning.message)
            .collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("Subtotal is negative"));
        assert!(messages[1].starts_with("Total is negative"));
    }

    #[test]
    fn pricing_warnings_surface_as_a_recommendation() {
        let config = pricing();
        let project = two_document_project();
        let items = vec![item("001", 10_000.0, "0.50", 0.9)];
        let summary = PricingSummary::from_line_items(&items, &config);

        let report = ConfidenceReport::build(&project, &items, &summary, &[], &[], &config);
        assert_eq!(report.pricing_warnings.len(), 1);
        assert_eq!(report.pricing_warnings[0].item_number.as_deref(), Some("001"));
        assert!(report
            .recommendations
            .contains(&"Check 1 pricing warning(s) before submission".to_string()));
    }
}
