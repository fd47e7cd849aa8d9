use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::parse_id;
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::Salary;
use crate::payroll::{CommissionPolicy, SalaryAction, SalaryInput};
use crate::services::SalaryService;

fn service(state: &AppState) -> SalaryService {
    SalaryService::new(state.backend.clone(), CommissionPolicy::from(&state.config.payroll))
}

/// POST /api/salaries
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<SalaryInput>,
) -> ApiResult<Salary> {
    let salary = service(&state).create(&input, &user).await?;
    Ok(ApiResponse::created(salary))
}

/// PUT /api/salaries/:id - recompute from new inputs; paid salaries are rejected
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(input): Json<SalaryInput>,
) -> ApiResult<Salary> {
    let id = parse_id(&id)?;
    Ok(ApiResponse::success(service(&state).update(id, &input, &user).await?))
}

pub async fn approve(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Salary> {
    apply(state, user, &id, SalaryAction::Approve).await
}

pub async fn pay(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Salary> {
    apply(state, user, &id, SalaryAction::Pay).await
}

pub async fn revert(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Salary> {
    apply(state, user, &id, SalaryAction::Revert).await
}

async fn apply(state: AppState, user: AuthUser, id: &str, action: SalaryAction) -> ApiResult<Salary> {
    let id = parse_id(id)?;
    Ok(ApiResponse::success(service(&state).apply(id, action, &user).await?))
}
