//! Routes behind `jwt_auth_middleware`; handlers read the caller from `Extension<AuthUser>`.

pub mod debts;
pub mod orders;
pub mod payroll;
pub mod salaries;

use uuid::Uuid;

use crate::error::ApiError;

pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Mã định danh không hợp lệ"))
}
