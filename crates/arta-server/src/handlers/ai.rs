//! AI endpoints: categorization, training, forecasting, anomaly detection

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::{core_error, ApiResponse, AppError, AppState};
use arta_core::{
    AnomalyReport, Categorization, FinancialInsights, ModelStatus, SpendingForecast,
    TrainingReport,
};

/// Categorization request body
#[derive(Debug, Deserialize)]
pub struct CategorizeRequest {
    pub description: String,
    #[serde(default)]
    pub amount: f64,
}

/// POST /api/ai/categorize - Categorize one transaction description
pub async fn categorize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CategorizeRequest>,
) -> Result<Json<ApiResponse<Categorization>>, AppError> {
    if request.description.trim().is_empty() {
        return Err(AppError::bad_request("Description is required"));
    }
    let result = state.service.categorize(&request.description, request.amount);
    Ok(ApiResponse::success(result))
}

/// POST /api/ai/train-category-model - Retrain the classifier on labeled rows
pub async fn train_category_model(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<TrainingReport>>, AppError> {
    let report = state.service.train_category_model().map_err(core_error)?;
    info!(
        "Classifier retrained: {} samples, accuracy {:.4}",
        report.training_samples, report.accuracy
    );
    Ok(ApiResponse::success(report))
}

/// GET /api/ai/model-status - Classifier training state
pub async fn model_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ModelStatus>>, AppError> {
    let status = state.service.model_status().map_err(core_error)?;
    Ok(ApiResponse::success(status))
}

/// GET /api/ai/predict-spending - Forecast next month's expenses
pub async fn predict_spending(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SpendingForecast>>, AppError> {
    let forecast = state.service.predict_spending().map_err(core_error)?;
    Ok(ApiResponse::success(forecast))
}

/// Anomaly detection query parameters
#[derive(Debug, Deserialize)]
pub struct AnomalyQuery {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize {
    arta_core::service::DEFAULT_TOP_ANOMALIES
}

/// GET /api/ai/detect-anomalies - Flag unusual expense transactions
pub async fn detect_anomalies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnomalyQuery>,
) -> Result<Json<ApiResponse<AnomalyReport>>, AppError> {
    let report = state
        .service
        .detect_anomalies(query.top_n)
        .map_err(core_error)?;
    Ok(ApiResponse::success(report))
}

/// GET /api/ai/financial-insights - Savings, spending and trend summary
pub async fn financial_insights(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<FinancialInsights>>, AppError> {
    let insights = state.service.financial_insights().map_err(core_error)?;
    Ok(ApiResponse::success(insights))
}
