//! Shipping carrier (Viettel Post partner API) used by the dev proxy.
//!
//! Each client-facing action maps to exactly one carrier endpoint; the
//! proxy only adds the base URL and forwards the caller's token.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};

use super::IntegrationError;

const SERVICE: &str = "Viettel Post";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ShippingAction {
    Login { username: String, password: String },
    GetProvinces,
    GetDistricts { province_id: i64 },
    GetWards { district_id: i64 },
    CalculateFee { payload: Value },
    ListServices { payload: Value },
    CreateOrder { payload: Value },
    GetTracking { order_number: String },
}

/// Resolved carrier request
#[derive(Debug, Clone, PartialEq)]
pub struct CarrierCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub requires_token: bool,
}

impl ShippingAction {
    pub fn to_call(&self) -> CarrierCall {
        let (method, path, body, requires_token) = match self {
            ShippingAction::Login { username, password } => (
                Method::POST,
                "/user/Login".to_string(),
                Some(json!({ "USERNAME": username, "PASSWORD": password })),
                false,
            ),
            ShippingAction::GetProvinces => {
                (Method::GET, "/categories/listProvinceById?provinceId=-1".to_string(), None, false)
            }
            ShippingAction::GetDistricts { province_id } => (
                Method::GET,
                format!("/categories/listDistrict?provinceId={}", province_id),
                None,
                false,
            ),
            ShippingAction::GetWards { district_id } => (
                Method::GET,
                format!("/categories/listWards?districtId={}", district_id),
                None,
                false,
            ),
            ShippingAction::CalculateFee { payload } => {
                (Method::POST, "/order/getPrice".to_string(), Some(payload.clone()), true)
            }
            ShippingAction::ListServices { payload } => {
                (Method::POST, "/order/getPriceAll".to_string(), Some(payload.clone()), true)
            }
            ShippingAction::CreateOrder { payload } => {
                (Method::POST, "/order/createOrder".to_string(), Some(payload.clone()), true)
            }
            ShippingAction::GetTracking { order_number } => (
                Method::GET,
                format!("/order/getOrderStatus?ORDER_NUMBER={}", url_encode(order_number)),
                None,
                true,
            ),
        };
        CarrierCall { method, path, body, requires_token }
    }
}

fn url_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[async_trait]
pub trait CarrierApi: Send + Sync {
    async fn send(&self, call: CarrierCall, token: Option<&str>) -> Result<Value, IntegrationError>;
}

pub struct CarrierClient {
    client: Client,
    base_url: String,
}

impl CarrierClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl CarrierApi for CarrierClient {
    async fn send(&self, call: CarrierCall, token: Option<&str>) -> Result<Value, IntegrationError> {
        if call.requires_token && token.is_none() {
            return Err(IntegrationError::InvalidRequest("Thiếu token đăng nhập Viettel Post".into()));
        }

        let url = format!("{}{}", self.base_url, call.path);
        tracing::debug!("Carrier {} {}", call.method, call.path);

        let mut request = self.client.request(call.method, url);
        if let Some(token) = token {
            request = request.header("Token", token);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body: Value = response.json().await.map_err(|e| IntegrationError::Decode {
            service: SERVICE,
            message: e.to_string(),
        })?;

        // The carrier wraps results as {status, error, message, data}
        let failed = body.get("error").and_then(Value::as_bool).unwrap_or(false);
        if failed || !(200..300).contains(&status) {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_string();
            return Err(IntegrationError::Upstream { service: SERVICE, status, message });
        }
        Ok(body)
    }
}
