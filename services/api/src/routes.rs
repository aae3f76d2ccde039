use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use bidsmith::bidding::{BidAssembler, BidPackage, PricingSettings, PricingSummary};
use bidsmith::error::AppError;
use bidsmith::matching::{Catalog, CatalogProduct};
use bidsmith::pipeline::{ProjectAnalysis, ProjectDocuments};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
pub(crate) struct AnalysisRequest {
    pub(crate) documents: ProjectDocuments,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BidRequest {
    pub(crate) documents: ProjectDocuments,
    #[serde(default)]
    pub(crate) catalog: Vec<CatalogProduct>,
    #[serde(default)]
    pub(crate) pricing: Option<PricingSettings>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BidResponse {
    #[serde(flatten)]
    pub(crate) bid: BidPackage,
    /// The pricing summary rounded to cents.
    pub(crate) totals: PricingSummary,
}

pub(crate) fn router() -> Router {
    Router::new()
        .route("/healthz", get(healthcheck))
        .route("/readyz", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/analysis", post(analysis_endpoint))
        .route("/api/v1/bids", post(bid_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn analysis_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<AnalysisRequest>,
) -> Json<ProjectAnalysis> {
    let analysis = state
        .analyzer
        .analyze_concurrent(payload.documents, state.extraction_timeout)
        .await;
    Json(analysis)
}

pub(crate) async fn bid_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<BidRequest>,
) -> Result<Json<BidResponse>, AppError> {
    let BidRequest {
        documents,
        catalog,
        pricing,
    } = payload;

    let pricing = match pricing {
        Some(settings) => settings.resolve()?,
        None => state.pricing.resolve()?,
    };
    let catalog = Catalog::from_products(catalog);

    let analysis = state
        .analyzer
        .analyze_concurrent(documents, state.extraction_timeout)
        .await;
    let bid = BidAssembler::new(state.analyzer.matcher()).assemble(&analysis, &catalog, &pricing)?;
    let totals = bid.pricing_summary.rounded();

    info!(
        line_items = bid.line_items.len(),
        catalog_issues = catalog.issues().len(),
        total = %totals.total,
        "bid request served"
    );

    Ok(Json(BidResponse { bid, totals }))
}
