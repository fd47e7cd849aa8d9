//! Multi-step operations over the backend: each service loads rows, applies
//! the domain rules, then writes the results back.

pub mod debt_service;
pub mod metrics_service;
pub mod oauth_service;
pub mod return_service;
pub mod salary_service;

use thiserror::Error;

use crate::backend::BackendError;
use crate::error::ApiError;
use crate::integrations::IntegrationError;
use crate::inventory::InventoryError;
use crate::models::FinanceError;
use crate::payroll::PayrollError;

pub use debt_service::DebtService;
pub use metrics_service::{MetricsParams, MetricsRequest, MetricsService};
pub use oauth_service::{CallbackParams, OAuthError, OAuthService};
pub use return_service::{ReturnService, ReturnSummary};
pub use salary_service::SalaryService;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Row missing for this tenant; the message is shown to the user
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row changed between read and write
    #[error("Concurrent update: {0}")]
    Stale(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Payroll(#[from] PayrollError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Finance(#[from] FinanceError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::Stale(msg) => {
                tracing::warn!("Stale write rejected: {}", msg);
                ApiError::conflict("Dữ liệu đã bị thay đổi, vui lòng tải lại")
            }
            ServiceError::Backend(e) => e.into(),
            ServiceError::Payroll(e) => e.into(),
            ServiceError::Inventory(e) => e.into(),
            ServiceError::Finance(e) => e.into(),
            ServiceError::Integration(e) => e.into(),
        }
    }
}
