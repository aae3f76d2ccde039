use crate::cli::ServeArgs;
use crate::infra::{AppState, DEFAULT_EXTRACTION_TIMEOUT};
use crate::routes::router;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use bidsmith::config::AppConfig;
use bidsmith::error::AppError;
use bidsmith::pipeline::ProjectAnalyzer;
use bidsmith::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let extraction_timeout = args
        .extraction_timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_EXTRACTION_TIMEOUT);
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        analyzer: ProjectAnalyzer::standard(),
        pricing: Arc::new(config.pricing.clone()),
        extraction_timeout: Some(extraction_timeout),
    };

    let app = router()
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, ?extraction_timeout, "bid service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
