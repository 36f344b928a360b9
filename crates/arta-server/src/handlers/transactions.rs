//! Transaction store endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{core_error, ApiResponse, AppError, AppState, MAX_PAGE_LIMIT};
use arta_core::{NewTransaction, TransactionRecord, TransactionType};

/// Listing filters
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    pub category: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/transactions - List transactions, newest first
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<TransactionRecord>>>, AppError> {
    let transaction_type = match query.transaction_type.as_deref() {
        Some(raw) => Some(
            raw.parse::<TransactionType>()
                .map_err(|e| AppError::bad_request(&e))?,
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(100).clamp(1, MAX_PAGE_LIMIT);

    let records = state
        .db
        .list_transactions(transaction_type, query.category.as_deref(), limit)
        .map_err(core_error)?;
    Ok(ApiResponse::success(records))
}

/// Create response: the stored row id
#[derive(Serialize)]
pub struct CreateResponse {
    pub id: i64,
}

/// POST /api/transactions - Insert one transaction
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Json(tx): Json<NewTransaction>,
) -> Result<Json<ApiResponse<CreateResponse>>, AppError> {
    let id = state.db.insert_transaction(&tx).map_err(core_error)?;
    Ok(ApiResponse::success(CreateResponse { id }))
}

/// Category update body
#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub category: String,
}

/// PUT /api/transactions/:id/category - Correct a transaction's category
pub async fn update_transaction_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCategoryRequest>,
) -> Result<Json<ApiResponse<CreateResponse>>, AppError> {
    if request.category.trim().is_empty() {
        return Err(AppError::bad_request("Category is required"));
    }
    state
        .db
        .update_category(id, &request.category)
        .map_err(core_error)?;
    Ok(ApiResponse::success(CreateResponse { id }))
}
