//! Arta Web Server
//!
//! Axum-based REST API for the Arta personal finance application. Thin
//! HTTP shell over `arta_core::AiService`: handlers validate input, call
//! the service, and wrap results in a `{"status": "success", "data": ...}`
//! envelope. Domain errors (untrained models, insufficient data, bad
//! input) map to 400; everything else is a sanitized 500.

use std::path::Path;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use arta_core::{build_service, AiService, Database};

mod handlers;

/// Maximum pagination limit for transaction listings
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub service: AiService,
}

/// Success envelope wrapping every API payload
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            status: "success",
            data,
        })
    }
}

/// Create the application router
pub fn create_router(db: Database, model_dir: &Path) -> Router {
    let service = build_service(db.clone(), model_dir);
    info!("Model artifacts at {}", model_dir.display());

    let state = Arc::new(AppState { db, service });

    let api_routes = Router::new()
        // Transactions
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/transactions/:id/category",
            put(handlers::update_transaction_category),
        )
        // AI
        .route("/ai/categorize", post(handlers::categorize))
        .route("/ai/train-category-model", post(handlers::train_category_model))
        .route("/ai/model-status", get(handlers::model_status))
        .route("/ai/predict-spending", get(handlers::predict_spending))
        .route("/ai/detect-anomalies", get(handlers::detect_anomalies))
        .route("/ai/financial-insights", get(handlers::financial_insights))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the process is stopped
pub async fn serve(addr: std::net::SocketAddr, app: Router) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }
}

/// Map core errors onto HTTP statuses. Domain conditions the client can
/// act on (train first, add more data, fix the payload) become 400s with
/// the real message; storage and serialization failures stay opaque.
pub fn core_error(err: arta_core::Error) -> AppError {
    match err {
        arta_core::Error::NotTrained(model) => AppError::bad_request(&format!(
            "Model '{}' is not trained yet. Train it or add more data first.",
            model
        )),
        arta_core::Error::InsufficientData(msg) | arta_core::Error::InvalidData(msg) => {
            AppError::bad_request(&msg)
        }
        other => other.into(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "status": "error",
            "message": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
