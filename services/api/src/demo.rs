use crate::infra::{load_pricing, read_documents, DEFAULT_EXTRACTION_TIMEOUT};
use bidsmith::bidding::{BidAssembler, BidPackage, PricingSettings};
use bidsmith::config::AppConfig;
use bidsmith::domain::{AlertLevel, DocumentType};
use bidsmith::error::AppError;
use bidsmith::matching::{Catalog, CatalogProduct};
use bidsmith::money::{decimal, round_currency};
use bidsmith::pipeline::{ProjectAnalyzer, ProjectDocuments};
use bidsmith::telemetry;
use bigdecimal::BigDecimal;
use clap::Args;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Args, Debug, Default)]
pub(crate) struct BidArgs {
    /// Extracted specification text
    #[arg(long)]
    pub(crate) specifications: Option<PathBuf>,
    /// Extracted bid form / bid schedule text
    #[arg(long)]
    pub(crate) bid_forms: Option<PathBuf>,
    /// Extracted construction plan text
    #[arg(long)]
    pub(crate) construction_plans: Option<PathBuf>,
    /// Extracted supplemental notice / addendum text
    #[arg(long)]
    pub(crate) supplemental: Option<PathBuf>,
    /// Product catalog CSV (id,name,category,unit,price[,description])
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    /// Pricing settings JSON; defaults to the standard rates
    #[arg(long)]
    pub(crate) pricing: Option<PathBuf>,
    /// Print the full bid package as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the full bid package as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
    /// Drop the sample catalog to show category default pricing
    #[arg(long)]
    pub(crate) without_catalog: bool,
}

pub(crate) async fn run_bid(args: BidArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let documents = read_documents([
        (DocumentType::Specifications, args.specifications.as_ref()),
        (DocumentType::BidForms, args.bid_forms.as_ref()),
        (DocumentType::ConstructionPlans, args.construction_plans.as_ref()),
        (DocumentType::Supplemental, args.supplemental.as_ref()),
    ])?;
    let catalog = match &args.catalog {
        Some(path) => Catalog::from_path(path)?,
        None => Catalog::default(),
    };
    let settings = match &args.pricing {
        Some(path) => load_pricing(path)?,
        None => config.pricing.clone(),
    };

    let package = assemble(documents, &catalog, &settings).await?;
    emit(&package, args.json)
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let catalog = if args.without_catalog {
        Catalog::default()
    } else {
        sample_catalog()
    };

    if !args.json {
        println!("Bid assembly demo: Route 9 overcrossing barrier replacement");
        println!(
            "- {} sample documents | {} catalog products",
            sample_project().len(),
            catalog.len()
        );
    }

    let package = assemble(sample_project(), &catalog, &PricingSettings::standard()).await?;
    emit(&package, args.json)
}

async fn assemble(
    documents: ProjectDocuments,
    catalog: &Catalog,
    settings: &PricingSettings,
) -> Result<BidPackage, AppError> {
    let pricing = settings.resolve()?;
    let analyzer = ProjectAnalyzer::standard();
    let analysis = analyzer
        .analyze_concurrent(documents, Some(DEFAULT_EXTRACTION_TIMEOUT))
        .await;
    Ok(BidAssembler::new(analyzer.matcher()).assemble(&analysis, catalog, &pricing)?)
}

fn emit(package: &BidPackage, json: bool) -> Result<(), AppError> {
    if json {
        println!("{}", serde_json::to_string_pretty(package)?);
    } else {
        render_bid_summary(package);
    }
    Ok(())
}

pub(crate) fn render_bid_summary(package: &BidPackage) {
    let analysis = &package.comprehensive_analysis;
    let report = &package.confidence_report;

    println!("\nDocuments");
    for document_type in DocumentType::ordered() {
        let coverage = report
            .document_coverage
            .get(&document_type)
            .copied()
            .unwrap_or(0.0);
        match analysis.documents.get(&document_type) {
            Some(document) => println!(
                "- {}: {} terms | {} quantities | {:.0}% coverage | {:.2} text quality",
                document_type,
                document.metadata.term_count,
                document.metadata.quantity_count,
                coverage * 100.0,
                document.metadata.text_quality
            ),
            None => println!("- {}: not analysed", document_type),
        }
    }

    let alerts = analysis.alerts();
    let urgent = alerts
        .iter()
        .filter(|alert| matches!(alert.level, AlertLevel::Critical | AlertLevel::High))
        .count();
    println!("\nAlerts: {} total ({} high or critical)", alerts.len(), urgent);
    for alert in alerts.iter().filter(|alert| alert.level != AlertLevel::Info) {
        println!("  - [{}] {}", alert.level.label(), alert.message);
    }

    println!("\nLine items");
    if package.line_items.is_empty() {
        println!("  (no priced terms)");
    }
    for item in &package.line_items {
        println!(
            "  {} {:<44} {:>10} {:<4} @ {:>9} = {:>11}  conf {:.2}",
            item.item_number,
            item.description,
            item.quantity,
            item.unit,
            round_currency(&item.unit_price),
            round_currency(&item.total_price),
            item.confidence
        );
        for note in &item.cross_reference_notes {
            println!("      {}", note);
        }
    }

    let totals = package.pricing_summary.rounded();
    println!("\nTotals");
    println!("- Material subtotal: {}", totals.subtotal);
    println!("- Waste allowance:   {}", totals.waste_adjustment);
    println!("- Markup:            {}", totals.markup_amount);
    println!("- Delivery:          {}", totals.delivery_fee);
    println!("- Tax:               {}", totals.tax_amount);
    println!("- Total:             {}", totals.total);

    if let Some(takeoff) = &package.formwork_takeoff {
        println!(
            "\nFormwork takeoff: {} SQFT | {} plywood sheets | {} board feet",
            takeoff.formwork_area_sqft,
            takeoff.plywood_sheets,
            round_currency(&decimal(takeoff.total_board_feet))
        );
    }

    println!(
        "\nOverall confidence {:.0}% | completeness {:.0}% | grade {:?} ({}, {:.2})",
        report.overall_confidence * 100.0,
        report.completeness * 100.0,
        report.quality_grade,
        report.quality_grade.label(),
        report.quality_score
    );
    for recommendation in &report.recommendations {
        println!("- {}", recommendation);
    }
    for warning in &report.pricing_warnings {
        match &warning.item_number {
            Some(number) => println!("! {}: {}", number, warning.message),
            None => println!("! {}", warning.message),
        }
    }
    if !report.manual_review_items.is_empty() {
        println!("Manual review:");
        for review in &report.manual_review_items {
            println!(
                "  - {} ({:.2}): {}",
                review.item_number.as_deref().unwrap_or(review.term.as_str()),
                review.confidence,
                review.reasons.join("; ")
            );
        }
    }
}

fn sample_project() -> ProjectDocuments {
    ProjectDocuments::from([
        (
            DocumentType::Specifications,
            "SECTION 51-1.03 CONCRETE BARRIER TYPE 86H\n\
Furnish 180 EA baluster units conforming to the standard plans.\n\
Formwork shall be plywood faced. Form facing shall be free of defects.\n\
Blockouts shall be provided at each expansion joint.\n\
Fractured rib texture shall be applied to the exterior face, 2,200 SF.\n\
\u{c}SECTION 13 WATER POLLUTION CONTROL\n\
Erosion control measures shall be maintained for the duration of work.\n"
                .to_string(),
        ),
        (
            DocumentType::BidForms,
            "ITEM CODE DESCRIPTION UNIT QUANTITY\n\
12 0512345 BALUSTER EA 200\n\
13 0512350 TYPE 86H RAIL LF 640\n\
14 0512360 FORMWORK SQFT 3,200\n\
15 0512370 FRACTURED RIB TEXTURE SQFT 2,200\n\
16 0130100 EROSION CONTROL LF 900\n"
                .to_string(),
        ),
        (
            DocumentType::ConstructionPlans,
            "SHEET S-4 BARRIER ELEVATION\n\
(200) BALUSTERS, SEE DETAIL A\n\
(16) BLOCKOUTS AT EXPANSION JOINTS\n\
FALSEWORK PER CONTRACTOR DESIGN\n"
                .to_string(),
        ),
        (
            DocumentType::Supplemental,
            "ADDENDUM NO. 2\n\
Add stamped concrete at the abutment approaches, 450 SF.\n"
                .to_string(),
        ),
    ])
}

fn sample_catalog() -> Catalog {
    let product = |id: &str, name: &str, category: &str, unit: &str, price: &str| {
        CatalogProduct {
            id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            unit: unit.to_string(),
            price: BigDecimal::from_str(price).unwrap_or_default(),
            description: None,
        }
    };

    Catalog::from_products(vec![
        product("WC-100", "Concrete Baluster Form", "bridge_barrier", "EA", "25.00"),
        product("WC-110", "Type 86H Rail Form Set", "bridge_barrier", "LF", "38.50"),
        product("WC-200", "Plywood Formwork Panel", "formwork", "SQFT", "4.10"),
        product("WC-300", "Fractured Rib Form Liner", "concrete", "SQFT", "7.25"),
        product("WC-400", "Erosion Control Fiber Roll", "temporary_structures", "LF", "2.15"),
        product("WC-500", "Form Tie Snap Tie", "hardware", "EA", "0.85"),
    ])
}
