use crate::cli::ServeArgs;
use crate::infra::{wire_from_config, AppState};
use crate::routes::with_matching_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hopelink::config::AppConfig;
use hopelink::error::AppError;
use hopelink::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(seed_dir) = args.seed_dir.take() {
        config.matching.seed_dir = Some(seed_dir);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let (wiring, seeded) = wire_from_config(&config.matching)?;
    // Materialise default parameters before traffic arrives.
    wiring.service.get_matching_parameters()?;

    let app = with_matching_routes(wiring.service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        seeded = seeded.is_some(),
        recommendation_limit = config.matching.recommendation_limit,
        "hopelink matching service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
