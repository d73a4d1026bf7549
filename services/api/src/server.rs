use crate::cli::ServeArgs;
use crate::demo::demo_catalog;
use crate::infra::{AppState, CatalogRepository};
use crate::routes::with_matching_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use oncomatch::config::AppConfig;
use oncomatch::error::AppError;
use oncomatch::matching::MatchingEngine;
use oncomatch::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

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
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = match config.catalog.path.as_deref() {
        Some(path) => CatalogRepository::from_path(path)?,
        None => {
            warn!("MATCH_CATALOG_PATH not set; serving the built-in demo catalog");
            CatalogRepository::new(demo_catalog())
        }
    };
    let protocols = repository.len();
    let engine = Arc::new(MatchingEngine::new(
        Arc::new(repository),
        config.matching.clone(),
    )?);

    let app = with_matching_routes(engine)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, protocols, "protocol matching service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
