use axum::{extract::State, Extension, Json};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::payroll::{compute_salary, CommissionPolicy, SalaryBreakdown, SalaryInput};

/// POST /api/payroll/preview - compute a salary without storing anything
pub async fn preview(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<SalaryInput>,
) -> ApiResult<SalaryBreakdown> {
    let policy = CommissionPolicy::from(&state.config.payroll);
    let breakdown = compute_salary(&input, &policy)?;
    tracing::debug!("Payroll preview for {} by {}: {}", input.employee_id, user.user_id, breakdown.total_salary);
    Ok(ApiResponse::success(breakdown))
}
