//! Turns a cross-referenced project analysis into a priced bid package.

mod pricing;
mod report;
mod takeoff;

pub use pricing::{
    line_total, standard_fallback_prices, standard_typical_unit_prices, ConfigurationError,
    PriceRange, PricingConfig, PricingSettings, PricingSummary, WasteFactorTable,
    DEFAULT_MANUAL_REVIEW_FLOOR,
};
pub use report::{ConfidenceReport, ManualReviewItem, PricingWarning, QualityGrade};
pub use takeoff::{FormworkTakeoff, LumberRequirement};

use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::analysis::DocumentAnalysis;
use crate::domain::{
    term_label, DocumentType, ExtractedQuantity, MaterialCategory, Priority, Unit,
};
use crate::matching::{ApproximateMatcher, Catalog, ProductCandidate, ProductMatcher};
use crate::money::round_currency;
use crate::pipeline::ProjectAnalysis;

const EXTRA_SOURCE_BONUS: f64 = 0.05;
const DISCREPANCY_FACTOR: f64 = 0.85;
const FALLBACK_FACTOR: f64 = 0.7;
const UNPRICED_FACTOR: f64 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("catalog cannot price any term: {reason}")]
    InvalidCatalog {
        reason: String,
        unpriced_terms: Vec<String>,
    },
}

/// Where a line item's unit price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Catalog,
    CategoryDefault,
    /// No catalog match and no category default; priced at zero pending review.
    Unpriced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidLineItem {
    pub item_number: String,
    pub description: String,
    pub source_term: String,
    pub category: MaterialCategory,
    pub priority: Priority,
    pub quantity: f64,
    pub unit: Unit,
    pub unit_price: BigDecimal,
    pub total_price: BigDecimal,
    pub waste_factor: BigDecimal,
    pub markup_percentage: BigDecimal,
    pub delivery_fee_share: BigDecimal,
    pub confidence: f64,
    pub source_documents: Vec<DocumentType>,
    pub cross_reference_notes: Vec<String>,
    pub price_source: PriceSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub official_item_number: Option<String>,
}

/// The engine's output artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidPackage {
    pub line_items: Vec<BidLineItem>,
    pub pricing_summary: PricingSummary,
    pub comprehensive_analysis: ProjectAnalysis,
    pub confidence_report: ConfidenceReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formwork_takeoff: Option<FormworkTakeoff>,
}

struct TermProfile {
    category: MaterialCategory,
    priority: Priority,
    confidence: f64,
}

struct Pricing {
    unit_price: BigDecimal,
    source: PriceSource,
    product: Option<ProductCandidate>,
}

/// Builds priced line items. Pure with respect to its inputs.
pub struct BidAssembler {
    matcher: Arc<dyn ApproximateMatcher>,
}

impl BidAssembler {
    pub fn new(matcher: Arc<dyn ApproximateMatcher>) -> Self {
        Self { matcher }
    }

    pub fn assemble(
        &self,
        analysis: &ProjectAnalysis,
        catalog: &Catalog,
        config: &PricingConfig,
    ) -> Result<BidPackage, AssemblyError> {
        config.validate()?;

        let matcher = ProductMatcher::new(self.matcher.as_ref())
            .with_min_score(config.match_score_threshold)
            .with_max_candidates(config.max_candidates);
        let profiles = term_profiles(analysis);

        let mut priced_terms: Vec<(&str, &TermProfile)> = profiles
            .iter()
            .filter(|(_, profile)| profile.priority != Priority::Low)
            .map(|(term, profile)| (term.as_str(), profile))
            .collect();
        priced_terms.sort_by(|left, right| left.1.priority.cmp(&right.1.priority).then(left.0.cmp(right.0)));

        let mut line_items = Vec::new();
        let mut unquantified = Vec::new();
        for (term, profile) in priced_terms {
            let Some(governing) = governing_quantity(analysis, term) else {
                unquantified.push((term.to_string(), profile.confidence));
                continue;
            };

            let pricing = price_term(&matcher, term, profile.category, catalog, config);
            line_items.push(self.line_item(analysis, term, profile, governing, pricing, config));
        }

        if catalog.is_empty()
            && !line_items.is_empty()
            && line_items
                .iter()
                .all(|item| item.price_source == PriceSource::Unpriced)
        {
            let reason = if catalog.issues().is_empty() {
                "catalog is empty and no category default prices are configured".to_string()
            } else {
                format!(
                    "all {} catalog records were rejected and no category default prices are configured",
                    catalog.issues().len()
                )
            };
            return Err(AssemblyError::InvalidCatalog {
                reason,
                unpriced_terms: line_items.into_iter().map(|item| item.source_term).collect(),
            });
        }

        for (index, item) in line_items.iter_mut().enumerate() {
            item.item_number = format!("{:03}", index + 1);
        }

        let pricing_summary = PricingSummary::from_line_items(&line_items, config);
        distribute_delivery_fee(&mut line_items, &pricing_summary.delivery_fee);

        let confidence_report = ConfidenceReport::build(
            analysis,
            &line_items,
            &pricing_summary,
            &unquantified,
            catalog.issues(),
            config,
        );
        let formwork_takeoff = FormworkTakeoff::from_line_items(&line_items);

        info!(
            line_items = line_items.len(),
            manual_review = confidence_report.manual_review_items.len(),
            total = %round_currency(&pricing_summary.total),
            "bid assembled"
        );

        Ok(BidPackage {
            line_items,
            pricing_summary,
            comprehensive_analysis: analysis.clone(),
            confidence_report,
            formwork_takeoff,
        })
    }

    fn line_item(
        &self,
        analysis: &ProjectAnalysis,
        term: &str,
        profile: &TermProfile,
        governing: &ExtractedQuantity,
        pricing: Pricing,
        config: &PricingConfig,
    ) -> BidLineItem {
        let cross_reference = &analysis.cross_reference;
        let waste_factor = config.waste_factors.factor_for(profile.category).clone();
        let total_price = line_total(
            governing.value,
            &pricing.unit_price,
            &waste_factor,
            &config.markup_percentage,
        );

        let mut source_documents: BTreeSet<DocumentType> =
            cross_reference.documents_for(term).iter().copied().collect();
        source_documents.insert(governing.source_document);

        let official_item = analysis
            .analysis(DocumentType::BidForms)
            .filter(|_| governing.source_document == DocumentType::BidForms)
            .and_then(|bid_forms| bid_forms.bid_item_for(&governing.id));

        let mut notes = Vec::new();
        if let Some(item) = official_item {
            let code = item
                .item_code
                .as_deref()
                .map(|code| format!(" (item code {code})"))
                .unwrap_or_default();
            notes.push(format!(
                "governing quantity from official bid item {}{code}",
                item.item_number
            ));
        }
        let mut discrepant = false;
        for discrepancy in cross_reference.discrepancies_for(term) {
            discrepant = true;
            notes.push(format!(
                "{} shows {} {} against {} {} in {} ({:.1}% difference); {} quantity governs",
                discrepancy.documents[1],
                discrepancy.values[1],
                discrepancy.unit,
                discrepancy.values[0],
                discrepancy.unit,
                discrepancy.documents[0],
                discrepancy.difference_percent * 100.0,
                discrepancy.documents[0],
            ));
        }
        if cross_reference.lacks_bid_quantity(term) {
            notes.push(format!(
                "no bid form quantity; sized from the largest quantity in {}",
                governing.source_document
            ));
        }
        if cross_reference.is_scope_addition(term) {
            notes.push("not in the specifications; possible scope addition".to_string());
        }
        if let Some(product) = &pricing.product {
            if Unit::parse(&product.unit) != Some(governing.unit) {
                notes.push(format!(
                    "catalog unit {} differs from quantity unit {}",
                    product.unit, governing.unit
                ));
            }
        }
        match pricing.source {
            PriceSource::Catalog => {}
            PriceSource::CategoryDefault => notes.push(format!(
                "no catalog match; {} category default price used",
                profile.category.label()
            )),
            PriceSource::Unpriced => {
                notes.push("no catalog match and no category default price".to_string())
            }
        }

        let confidence = line_confidence(
            analysis,
            term,
            source_documents.len(),
            discrepant,
            pricing.source,
        );
        let description = match &pricing.product {
            Some(product) => format!("{} - {}", term_label(term), product.name),
            None => term_label(term),
        };

        debug!(term, source = ?pricing.source, confidence, "line item priced");

        BidLineItem {
            item_number: String::new(),
            description,
            source_term: term.to_string(),
            category: profile.category,
            priority: profile.priority,
            quantity: governing.value,
            unit: governing.unit,
            unit_price: pricing.unit_price,
            total_price,
            waste_factor,
            markup_percentage: config.markup_percentage.clone(),
            delivery_fee_share: BigDecimal::zero(),
            confidence,
            source_documents: source_documents.into_iter().collect(),
            cross_reference_notes: notes,
            price_source: pricing.source,
            product: pricing.product,
            official_item_number: official_item.map(|item| item.item_number.clone()),
        }
    }
}

/// Category, priority and best confidence of every term found in the project.
fn term_profiles(analysis: &ProjectAnalysis) -> BTreeMap<String, TermProfile> {
    let mut profiles: BTreeMap<String, TermProfile> = BTreeMap::new();
    for found in analysis.analyses().flat_map(|document| document.terms.iter()) {
        profiles
            .entry(found.term.clone())
            .and_modify(|profile| profile.confidence = profile.confidence.max(found.confidence))
            .or_insert(TermProfile {
                category: found.category,
                priority: found.priority,
                confidence: found.confidence,
            });
    }
    profiles
}

/// Bid-form quantities govern when present; otherwise the largest quantity found in the
/// remaining documents. Within the chosen source quantities on the term's own line win,
/// then the most common unit, then the largest value in that unit.
fn governing_quantity<'p>(analysis: &'p ProjectAnalysis, term: &str) -> Option<&'p ExtractedQuantity> {
    let official: Vec<(&ExtractedQuantity, bool)> = analysis
        .analysis(DocumentType::BidForms)
        .map(|bid_forms| located_quantities(bid_forms, term))
        .unwrap_or_default();
    if !official.is_empty() {
        return largest_in_dominant_unit(&official);
    }

    let others: Vec<(&ExtractedQuantity, bool)> = analysis
        .analyses()
        .filter(|document| document.document_type != DocumentType::BidForms)
        .flat_map(|document| located_quantities(document, term))
        .collect();
    largest_in_dominant_unit(&others)
}

/// Quantities associated with `term`, each flagged when it sits on a line that
/// names the term: its own bid row, or the line of a recorded term match.
fn located_quantities<'p>(
    document: &'p DocumentAnalysis,
    term: &str,
) -> Vec<(&'p ExtractedQuantity, bool)> {
    document
        .quantities_for(term)
        .into_iter()
        .map(|quantity| {
            let on_term_line = document.bid_item_for(&quantity.id).is_some()
                || document.matches_for(term).any(|found| {
                    found.page_number == quantity.page_number && found.line_number == quantity.line_number
                });
            (quantity, on_term_line)
        })
        .collect()
}

fn largest_in_dominant_unit<'p>(
    located: &[(&'p ExtractedQuantity, bool)],
) -> Option<&'p ExtractedQuantity> {
    let on_line = located.iter().any(|(_, on_term_line)| *on_term_line);
    let quantities: Vec<&ExtractedQuantity> = located
        .iter()
        .filter(|(_, on_term_line)| *on_term_line || !on_line)
        .map(|(quantity, _)| *quantity)
        .collect();

    let mut counts: BTreeMap<Unit, usize> = BTreeMap::new();
    for quantity in &quantities {
        *counts.entry(quantity.unit).or_default() += 1;
    }
    let unit = counts
        .iter()
        .max_by(|left, right| left.1.cmp(right.1).then(right.0.cmp(left.0)))
        .map(|(unit, _)| *unit)?;

    quantities
        .into_iter()
        .filter(|quantity| quantity.unit == unit)
        .reduce(|best, quantity| if quantity.value > best.value { quantity } else { best })
}

fn price_term(
    matcher: &ProductMatcher<'_>,
    term: &str,
    category: MaterialCategory,
    catalog: &Catalog,
    config: &PricingConfig,
) -> Pricing {
    if let Some(top) = matcher
        .candidates(term, Some(category.label()), catalog)
        .into_iter()
        .next()
    {
        return Pricing {
            unit_price: top.price.clone(),
            source: PriceSource::Catalog,
            product: Some(top),
        };
    }

    match config.fallback_unit_prices.get(&category) {
        Some(price) => Pricing {
            unit_price: price.clone(),
            source: PriceSource::CategoryDefault,
            product: None,
        },
        None => Pricing {
            unit_price: BigDecimal::zero(),
            source: PriceSource::Unpriced,
            product: None,
        },
    }
}

/// Best per-document term confidence, scaled by that document's cross-reference
/// adjustment, then corrected for agreement, discrepancies and the price path.
fn line_confidence(
    analysis: &ProjectAnalysis,
    term: &str,
    source_count: usize,
    discrepant: bool,
    source: PriceSource,
) -> f64 {
    let scores = &analysis.cross_reference.confidence_scores;
    let base = analysis
        .analyses()
        .filter_map(|document| {
            let confidence = document.term_confidence(term)?;
            let adjusted = scores.get(&document.document_type).copied();
            let factor = match adjusted {
                Some(score) if document.local_confidence > 0.0 => {
                    (score / document.local_confidence).min(1.0)
                }
                _ => 1.0,
            };
            Some(confidence * factor)
        })
        .fold(0.0, f64::max);

    let mut confidence = base + EXTRA_SOURCE_BONUS * source_count.saturating_sub(1) as f64;
    if discrepant {
        confidence *= DISCREPANCY_FACTOR;
    }
    confidence *= match source {
        PriceSource::Catalog => 1.0,
        PriceSource::CategoryDefault => FALLBACK_FACTOR,
        PriceSource::Unpriced => UNPRICED_FACTOR,
    };
    confidence.clamp(0.0, 1.0)
}

/// Splits the delivery fee across line items in proportion to their marked-up totals.
fn distribute_delivery_fee(items: &mut [BidLineItem], delivery_fee: &BigDecimal) {
    let total: BigDecimal = items.iter().map(|item| &item.total_price).sum();
    if total.is_zero() {
        return;
    }
    for item in items.iter_mut() {
        item.delivery_fee_share = delivery_fee * &item.total_price / &total;
    }
}
