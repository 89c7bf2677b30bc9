use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use ans_despesas::error::AppError;
use ans_despesas::pipeline::store::{
    self, ExpenseView, OperatorView, QuarterlyTotal, StatisticsView, StoreError,
};
use serde::Serialize;
use serde_json::json;

pub(crate) fn router() -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/operators", get(operators_index))
        .route("/api/v1/operators/:cnpj", get(operator_show))
        .route("/api/v1/operators/:cnpj/expenses", get(operator_expenses))
        .route(
            "/api/v1/operators/:cnpj/expenses/chart",
            get(operator_expenses_chart),
        )
        .route("/api/v1/statistics", get(statistics_endpoint))
}

#[derive(Debug, Serialize)]
pub(crate) struct ChartResponse {
    pub(crate) chart: Vec<QuarterlyTotal>,
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

pub(crate) async fn operators_index(
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<OperatorView>>, AppError> {
    let conn = state.store.lock().expect("store mutex poisoned");
    Ok(Json(store::list_operators(&conn)?))
}

pub(crate) async fn operator_show(
    Extension(state): Extension<AppState>,
    Path(cnpj): Path<String>,
) -> Result<Json<OperatorView>, AppError> {
    let conn = state.store.lock().expect("store mutex poisoned");
    let operator = store::operator_by_cnpj(&conn, &cnpj)?
        .ok_or(StoreError::OperatorNotFound { cnpj })?;
    Ok(Json(operator))
}

pub(crate) async fn operator_expenses(
    Extension(state): Extension<AppState>,
    Path(cnpj): Path<String>,
) -> Result<Json<Vec<ExpenseView>>, AppError> {
    let conn = state.store.lock().expect("store mutex poisoned");
    store::operator_by_cnpj(&conn, &cnpj)?
        .ok_or(StoreError::OperatorNotFound { cnpj: cnpj.clone() })?;
    Ok(Json(store::expenses_for_operator(&conn, &cnpj)?))
}

pub(crate) async fn operator_expenses_chart(
    Extension(state): Extension<AppState>,
    Path(cnpj): Path<String>,
) -> Result<Json<ChartResponse>, AppError> {
    let conn = state.store.lock().expect("store mutex poisoned");
    store::operator_by_cnpj(&conn, &cnpj)?
        .ok_or(StoreError::OperatorNotFound { cnpj: cnpj.clone() })?;
    let chart = store::quarterly_totals(&conn, &cnpj)?;
    Ok(Json(ChartResponse { chart }))
}

pub(crate) async fn statistics_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<Json<StatisticsView>, AppError> {
    let conn = state.store.lock().expect("store mutex poisoned");
    Ok(Json(store::statistics(&conn)?))
}
