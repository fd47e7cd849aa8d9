use axum::{
    extract::{Path, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::parse_id;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::Debt;
use crate::services::DebtService;

#[derive(Debug, Deserialize)]
pub struct PaymentBody {
    pub amount: Decimal,
    #[serde(default)]
    pub note: Option<String>,
}

/// POST /api/debts/:id/payments
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<PaymentBody>,
) -> ApiResult<Debt> {
    let id = parse_id(&id)?;
    let debt = DebtService::new(state.backend.clone())
        .record_payment(id, body.amount, body.note.as_deref(), &user)
        .await?;
    Ok(ApiResponse::success(debt))
}
