use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes;
use ans_despesas::config::AppConfig;
use ans_despesas::error::AppError;
use ans_despesas::pipeline::store;
use ans_despesas::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
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
    let conn = store::open(&config.data.database_path)?;
    let state = AppState::new(prometheus_handle, conn);
    let readiness_flag = state.readiness.clone();

    let app = routes::router()
        .layer(Extension(state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, database = %config.data.database_path.display(), "expense reporting service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
