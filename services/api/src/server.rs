use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryResponseRepository, InMemorySurveyCatalog};
use crate::routes::with_survey_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use survey_engine::config::AppConfig;
use survey_engine::error::AppError;
use survey_engine::surveys::{InMemorySubmissionThrottle, SurveyResponseService};
use survey_engine::telemetry;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(path) = args.surveys.take() {
        config.surveys.definitions_path = Some(path);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let catalog = Arc::new(InMemorySurveyCatalog::load(
        config.surveys.definitions_path.as_deref(),
    )?);
    let repository = Arc::new(InMemoryResponseRepository::default());
    let throttle = Arc::new(InMemorySubmissionThrottle::new(
        config.surveys.submission_window_secs,
    ));
    let response_service = Arc::new(SurveyResponseService::new(catalog, repository, throttle));

    let app = with_survey_routes(response_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        submission_window_secs = config.surveys.submission_window_secs,
        "survey scoring service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
