use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::app::AppState;
use crate::error::ApiError;
use crate::integrations::ShippingAction;
use crate::middleware::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
struct ShippingRequest {
    /// Carrier token from a previous `login`
    #[serde(default)]
    token: Option<String>,
    #[serde(flatten)]
    action: ShippingAction,
}

/// POST /api/shipping - forwards one carrier action; only mounted in development
pub async fn shipping_proxy(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult<Value> {
    let request: ShippingRequest = serde_json::from_value(body).map_err(|e| {
        tracing::debug!("Invalid shipping request: {}", e);
        ApiError::bad_request(format!("Yêu cầu vận chuyển không hợp lệ: {}", e))
    })?;

    let call = request.action.to_call();
    let result = state.carrier.send(call, request.token.as_deref()).await?;
    Ok(ApiResponse::success(result))
}
