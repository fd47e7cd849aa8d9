use axum::{
    extract::{Path, State},
    Extension,
};

use super::parse_id;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{ReturnService, ReturnSummary};

/// POST /api/orders/:id/return - restock the order's goods and refund what was paid
pub async fn return_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<ReturnSummary> {
    let id = parse_id(&id)?;
    let summary = ReturnService::new(state.backend.clone()).return_order(id, &user).await?;
    Ok(ApiResponse::success(summary))
}
