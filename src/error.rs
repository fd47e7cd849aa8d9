// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::backend::BackendError;
use crate::integrations::IntegrationError;
use crate::inventory::InventoryError;
use crate::models::FinanceError;
use crate::payroll::PayrollError;

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Messages are shown to end users as-is, so they are written in Vietnamese;
/// internal causes go to the log instead.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 429 Too Many Requests
    TooManyRequests(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (external service issues)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::TooManyRequests(_) => 429,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::TooManyRequests(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::TooManyRequests(_) => "TOO_MANY_REQUESTS",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            _ => json!({
                "error": true,
                "message": self.message(),
                "code": self.error_code()
            }),
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn field_error(field: &str, message: impl Into<String>) -> Self {
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), message.into());
        ApiError::validation_error("Dữ liệu không hợp lệ", Some(field_errors))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        ApiError::TooManyRequests(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(msg) => {
                tracing::debug!("Backend not found: {}", msg);
                ApiError::not_found("Không tìm thấy dữ liệu")
            }
            BackendError::Conflict(msg) => {
                tracing::warn!("Backend conflict: {}", msg);
                ApiError::conflict("Dữ liệu đã bị thay đổi, vui lòng tải lại")
            }
            BackendError::InvalidIdentifier(name) => ApiError::bad_request(format!("Tên trường không hợp lệ: {}", name)),
            BackendError::Request(e) => {
                tracing::error!("Backend request failed: {}", e);
                ApiError::service_unavailable("Không kết nối được cơ sở dữ liệu")
            }
            BackendError::Sqlx(e) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", e);
                ApiError::internal_server_error("Lỗi cơ sở dữ liệu")
            }
            other => {
                tracing::error!("Backend error: {}", other);
                ApiError::internal_server_error("Đã xảy ra lỗi khi xử lý yêu cầu")
            }
        }
    }
}

impl From<PayrollError> for ApiError {
    fn from(err: PayrollError) -> Self {
        match err {
            PayrollError::InvalidMonth(month) => ApiError::field_error("month", format!("Tháng không hợp lệ: {}", month)),
            PayrollError::InvalidInput(msg) => ApiError::validation_error(format!("Dữ liệu lương không hợp lệ: {}", msg), None),
            PayrollError::Forbidden { .. } => ApiError::forbidden("Bạn không có quyền thực hiện thao tác này"),
            PayrollError::InvalidTransition { from, action } => ApiError::conflict(format!(
                "Không thể {} bảng lương đang ở trạng thái {}",
                action_label(action),
                from.as_str()
            )),
            PayrollError::PaidLocked => ApiError::conflict("Bảng lương đã thanh toán, không thể chỉnh sửa"),
            PayrollError::TotalMismatch { stored, computed } => {
                tracing::warn!("Salary total mismatch: stored {} computed {}", stored, computed);
                ApiError::conflict("Tổng lương không khớp với các khoản thành phần")
            }
        }
    }
}

fn action_label(action: crate::payroll::SalaryAction) -> &'static str {
    use crate::payroll::SalaryAction;
    match action {
        SalaryAction::Approve => "duyệt",
        SalaryAction::Pay => "thanh toán",
        SalaryAction::Revert => "hoàn tác",
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::ProductNotFound(id) => ApiError::not_found(format!("Không tìm thấy sản phẩm {}", id)),
            InventoryError::NotReturnable(status) => {
                ApiError::conflict(format!("Đơn hàng ở trạng thái {} không thể hoàn trả", status.as_str()))
            }
            InventoryError::InvalidQuantity { product_id, quantity } => ApiError::field_error(
                "quantity",
                format!("Số lượng {} không hợp lệ cho sản phẩm {}", quantity, product_id),
            ),
            InventoryError::QuantityOverflow(product_id) => {
                ApiError::field_error("quantity", format!("Số lượng tồn kho vượt giới hạn cho sản phẩm {}", product_id))
            }
        }
    }
}

impl From<FinanceError> for ApiError {
    fn from(err: FinanceError) -> Self {
        match err {
            FinanceError::NonPositiveAmount => ApiError::field_error("amount", "Số tiền phải lớn hơn 0"),
            FinanceError::Overpayment { remaining, .. } => {
                ApiError::field_error("amount", format!("Số tiền vượt quá công nợ còn lại ({})", remaining))
            }
        }
    }
}

impl From<IntegrationError> for ApiError {
    fn from(err: IntegrationError) -> Self {
        tracing::error!("Integration error: {}", err);
        match err {
            IntegrationError::NotConfigured(_) => ApiError::service_unavailable("Tích hợp chưa được cấu hình"),
            IntegrationError::InvalidRequest(msg) => ApiError::bad_request(msg),
            _ => ApiError::bad_gateway(err.user_message()),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
