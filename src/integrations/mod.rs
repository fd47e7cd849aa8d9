//! Third-party HTTP APIs: Facebook Graph, Zalo Official Account, shipping carrier.
//!
//! Each one sits behind a trait so handlers can be driven without network
//! access; the reqwest-backed clients are the production implementations.

pub mod carrier;
pub mod facebook;
pub mod zalo;

use std::time::Duration;

use thiserror::Error;

pub use carrier::{CarrierApi, CarrierCall, CarrierClient, ShippingAction};
pub use facebook::{AccessToken, FacebookApi, GraphClient, ManagedPage};
pub use zalo::{ZaloApi, ZaloClient, ZaloOfficialAccount, ZaloToken};

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("Integration not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Unexpected response from {service}: {message}")]
    Decode { service: &'static str, message: String },
}

impl IntegrationError {
    /// Message suitable for showing to the end user
    pub fn user_message(&self) -> String {
        match self {
            IntegrationError::NotConfigured(_) => "Tích hợp chưa được cấu hình".to_string(),
            IntegrationError::InvalidRequest(msg) => msg.clone(),
            IntegrationError::Http(_) => "Không kết nối được dịch vụ bên ngoài".to_string(),
            IntegrationError::Upstream { service, message, .. } => format!("{} báo lỗi: {}", service, message),
            IntegrationError::Decode { service, .. } => format!("Phản hồi không hợp lệ từ {}", service),
        }
    }
}

/// Shared outbound client with the configured timeout
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, IntegrationError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}
