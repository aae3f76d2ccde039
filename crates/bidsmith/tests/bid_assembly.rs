use bidsmith::bidding::{
    AssemblyError, BidAssembler, BidPackage, ConfigurationError, PriceSource, PricingConfig,
    PricingSettings,
};
use bidsmith::crossref::RequirementGap;
use bidsmith::domain::{DocumentType, Unit};
use bidsmith::matching::{Catalog, CatalogProduct};
use bidsmith::pipeline::{ProjectAnalysis, ProjectAnalyzer, ProjectDocuments};
use bigdecimal::BigDecimal;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::str::FromStr;

fn amount(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).expect("decimal literal")
}

fn pinned() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

fn documents(entries: &[(DocumentType, &str)]) -> ProjectDocuments {
    entries
        .iter()
        .map(|(document_type, text)| (*document_type, text.to_string()))
        .collect::<BTreeMap<_, _>>()
}

fn product(id: &str, name: &str, category: &str, unit: &str, price: &str) -> CatalogProduct {
    CatalogProduct {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        unit: unit.to_string(),
        price: amount(price),
        description: None,
    }
}

fn baluster_catalog() -> Catalog {
    Catalog::from_products(vec![product(
        "WC-100",
        "Concrete Baluster Form",
        "bridge_barrier",
        "EA",
        "25.00",
    )])
}

fn standard_pricing() -> PricingConfig {
    PricingSettings::standard()
        .resolve()
        .expect("standard pricing resolves")
}

fn analyse(entries: &[(DocumentType, &str)]) -> (ProjectAnalyzer, ProjectAnalysis) {
    let analyzer = ProjectAnalyzer::standard();
    let project = analyzer.analyze_at(&documents(entries), pinned());
    (analyzer, project)
}

fn assemble(
    analyzer: &ProjectAnalyzer,
    project: &ProjectAnalysis,
    catalog: &Catalog,
    pricing: &PricingConfig,
) -> BidPackage {
    BidAssembler::new(analyzer.matcher())
        .assemble(project, catalog, pricing)
        .expect("bid assembles")
}

#[test]
fn single_bid_form_item_is_priced_from_the_catalog() {
    let (analyzer, project) = analyse(&[(DocumentType::BidForms, "12 BALUSTER EA 100")]);
    let package = assemble(&analyzer, &project, &baluster_catalog(), &standard_pricing());

    assert_eq!(package.line_items.len(), 1);
    let item = &package.line_items[0];
    assert_eq!(item.item_number, "001");
    assert_eq!(item.source_term, "BALUSTER");
    assert_eq!(item.quantity, 100.0);
    assert_eq!(item.unit, Unit::Ea);
    assert_eq!(item.unit_price, amount("25.00"));
    assert_eq!(item.waste_factor, amount("0.08"));
    assert_eq!(item.total_price, amount("3240"));
    assert_eq!(item.price_source, PriceSource::Catalog);
    assert_eq!(item.official_item_number.as_deref(), Some("12"));
    assert_eq!(item.delivery_fee_share, amount("150"));

    let summary = package.pricing_summary.rounded();
    assert_eq!(summary.subtotal, amount("2500.00"));
    assert_eq!(summary.waste_adjustment, amount("200.00"));
    assert_eq!(summary.markup_amount, amount("540.00"));
    assert_eq!(summary.delivery_fee, amount("150.00"));
    // 0.0825 * 3390
    assert_eq!(summary.tax_amount, amount("279.68"));
    assert_eq!(summary.total, amount("3669.68"));
    assert_eq!(package.pricing_summary.total, amount("3669.675"));
}

#[test]
fn neighbouring_bid_rows_do_not_lend_their_quantities() {
    let (analyzer, project) = analyse(&[(
        DocumentType::BidForms,
        "12 BALUSTER EA 100\n13 STRUCTURE EXCAVATION CY 400",
    )]);
    let package = assemble(&analyzer, &project, &baluster_catalog(), &standard_pricing());

    assert_eq!(package.line_items.len(), 1);
    let item = &package.line_items[0];
    assert_eq!(item.source_term, "BALUSTER");
    assert_eq!(item.quantity, 100.0);
    assert_eq!(item.unit, Unit::Ea);
    assert_eq!(item.official_item_number.as_deref(), Some("12"));
    assert_eq!(item.total_price, amount("3240"));
}

#[test]
fn quantity_on_the_term_line_beats_the_unit_vote() {
    let (analyzer, project) = analyse(&[(
        DocumentType::Specifications,
        "Baluster units 40 EA.\nJoint seal 120 LF, then 300 LF.",
    )]);
    let package = assemble(&analyzer, &project, &baluster_catalog(), &standard_pricing());

    let item = package
        .line_items
        .iter()
        .find(|item| item.source_term == "BALUSTER")
        .expect("baluster line item");
    assert_eq!(item.quantity, 40.0);
    assert_eq!(item.unit, Unit::Ea);
}

#[test]
fn bid_form_quantity_governs_a_discrepancy() {
    let (analyzer, project) = analyse(&[
        (DocumentType::BidForms, "12 BALUSTER EA 100"),
        (DocumentType::Specifications, "Furnish 80 EA baluster units."),
    ]);

    let discrepancies = &project.cross_reference.quantity_discrepancies;
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].term, "BALUSTER");
    assert!((discrepancies[0].difference_percent - 0.20).abs() < 1e-9);

    let package = assemble(&analyzer, &project, &baluster_catalog(), &standard_pricing());
    let item = &package.line_items[0];
    assert_eq!(item.quantity, 100.0);
    assert_eq!(
        item.source_documents,
        vec![DocumentType::Specifications, DocumentType::BidForms]
    );
    assert!(item
        .cross_reference_notes
        .iter()
        .any(|note| note.contains("specifications shows 80")));
    assert_eq!(package.confidence_report.discrepancies.len(), 1);
}

#[test]
fn supplemental_only_term_is_a_missing_requirement() {
    let (_, project) = analyse(&[
        (DocumentType::Specifications, "Formwork shall conform to section 51."),
        (DocumentType::Supplemental, "Erosion control 400 LF."),
    ]);

    let cross_reference = &project.cross_reference;
    assert!(cross_reference.quantity_discrepancies.is_empty());
    let gap = cross_reference
        .missing_requirements
        .iter()
        .find(|gap| gap.term == "EROSION_CONTROL")
        .expect("erosion control requirement");
    assert_eq!(gap.missing_from, DocumentType::Specifications);
    assert_eq!(gap.present_in, vec![DocumentType::Supplemental]);
    assert_eq!(gap.gap, RequirementGap::ScopeAddition);
}

#[test]
fn unmatched_term_falls_back_to_category_price() {
    let catalog = Catalog::from_products(vec![product(
        "WC-900",
        "Survey Stake Lath",
        "survey",
        "BDL",
        "18.00",
    )]);
    let (analyzer, project) = analyse(&[(DocumentType::BidForms, "12 BALUSTER EA 100")]);

    let fallback = assemble(&analyzer, &project, &catalog, &standard_pricing());
    let matched = assemble(&analyzer, &project, &baluster_catalog(), &standard_pricing());

    let item = &fallback.line_items[0];
    assert_eq!(item.price_source, PriceSource::CategoryDefault);
    assert_eq!(item.unit_price, amount("45.00"));
    assert!(item.confidence < matched.line_items[0].confidence);
    assert!(fallback
        .confidence_report
        .manual_review_items
        .iter()
        .any(|review| review.item_number.as_deref() == Some("001")));
}

#[test]
fn empty_catalog_without_defaults_is_invalid() {
    let settings = PricingSettings {
        fallback_unit_prices: Some(BTreeMap::new()),
        ..PricingSettings::standard()
    };
    let pricing = settings.resolve().expect("settings resolve");
    let (analyzer, project) = analyse(&[(DocumentType::BidForms, "12 BALUSTER EA 100")]);

    match BidAssembler::new(analyzer.matcher()).assemble(&project, &Catalog::default(), &pricing) {
        Err(AssemblyError::InvalidCatalog { unpriced_terms, .. }) => {
            assert_eq!(unpriced_terms, vec!["BALUSTER".to_string()]);
        }
        other => panic!("expected invalid catalog, got {other:?}"),
    }
}

#[test]
fn empty_catalog_still_prices_through_defaults() {
    let (analyzer, project) = analyse(&[(DocumentType::BidForms, "12 BALUSTER EA 100")]);
    let package = assemble(&analyzer, &project, &Catalog::default(), &standard_pricing());
    assert_eq!(package.line_items[0].price_source, PriceSource::CategoryDefault);
}

#[test]
fn invalid_pricing_is_fatal() {
    let mut pricing = standard_pricing();
    pricing.tax_rate = amount("-0.01");
    let (analyzer, project) = analyse(&[(DocumentType::BidForms, "12 BALUSTER EA 100")]);

    match BidAssembler::new(analyzer.matcher()).assemble(&project, &baluster_catalog(), &pricing) {
        Err(AssemblyError::Configuration(ConfigurationError::Invalid { field, .. })) => {
            assert_eq!(field, "tax_rate");
        }
        other => panic!("expected configuration error, got {other:?}"),
    }

    let missing = PricingSettings {
        markup_percentage: None,
        ..PricingSettings::standard()
    };
    assert_eq!(
        missing.resolve().expect_err("markup required"),
        ConfigurationError::Missing("markup_percentage")
    );
}

#[test]
fn assembly_is_deterministic() {
    let (analyzer, project) = analyse(&[
        (
            DocumentType::BidForms,
            "12 BALUSTER EA 100\n14 FORMWORK SQFT 2,400\n15 EROSION CONTROL LF 600",
        ),
        (
            DocumentType::Specifications,
            "Furnish 80 EA baluster units.\nFormwork 2,400 SF.\nStamped concrete 900 SF.",
        ),
        (DocumentType::ConstructionPlans, "(24) BALUSTERS at each blockout."),
    ]);
    let catalog = baluster_catalog();
    let pricing = standard_pricing();

    let first = assemble(&analyzer, &project, &catalog, &pricing);
    let second = assemble(&analyzer, &project, &catalog, &pricing);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).expect("serialize"),
        serde_json::to_string(&second).expect("serialize")
    );
}

#[test]
fn formwork_area_produces_a_lumber_takeoff() {
    let (analyzer, project) = analyse(&[(DocumentType::BidForms, "14 FORMWORK SQFT 1,000")]);
    let package = assemble(&analyzer, &project, &baluster_catalog(), &standard_pricing());

    let takeoff = package.formwork_takeoff.expect("formwork takeoff");
    assert_eq!(takeoff.formwork_area_sqft, 1000.0);
    assert_eq!(takeoff.plywood_sheets, 13);
    assert_eq!(package.line_items[0].waste_factor, amount("0.10"));
}

#[test]
fn recommendations_name_missing_documents() {
    let (analyzer, project) = analyse(&[(DocumentType::BidForms, "12 BALUSTER EA 100")]);
    let package = assemble(&analyzer, &project, &baluster_catalog(), &standard_pricing());

    let recommendations = &package.confidence_report.recommendations;
    assert!(recommendations
        .iter()
        .any(|text| text.contains("No specifications text was supplied")));
    assert!(!recommendations
        .iter()
        .any(|text| text == "No blocking issues detected"));
}
