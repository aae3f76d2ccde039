use bidsmith::bidding::PricingSettings;
use bidsmith::domain::DocumentType;
use bidsmith::error::AppError;
use bidsmith::pipeline::{ProjectAnalyzer, ProjectDocuments};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub(crate) const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) analyzer: ProjectAnalyzer,
    /// Used when a request carries no pricing block.
    pub(crate) pricing: Arc<PricingSettings>,
    pub(crate) extraction_timeout: Option<Duration>,
}

/// Reads whichever document files were supplied. Absent paths stay absent so the
/// pipeline reports them as missing documents.
pub(crate) fn read_documents(
    paths: [(DocumentType, Option<&PathBuf>); 4],
) -> Result<ProjectDocuments, AppError> {
    let mut documents = ProjectDocuments::new();
    for (document_type, path) in paths {
        let Some(path) = path else {
            continue;
        };
        let text = std::fs::read_to_string(path)?;
        debug!(%document_type, path = %path.display(), bytes = text.len(), "document text loaded");
        documents.insert(document_type, text);
    }
    Ok(documents)
}

/// Pricing settings from a JSON file, with `BID_*` environment overrides on top.
pub(crate) fn load_pricing(path: &Path) -> Result<PricingSettings, AppError> {
    let raw = std::fs::read_to_string(path)?;
    let settings: PricingSettings = serde_json::from_str(&raw)?;
    Ok(settings.with_env_overrides()?)
}
