//! Routes reachable without a bearer token.

pub mod facebook;
pub mod shipping;
pub mod zalo;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use url::Url;

use crate::app::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "BizOps API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "health": "/health (public)",
                "oauth": "/api/facebook/callback, /api/zalo/callback (public)",
                "metrics": "/api/facebook/metrics (public, rate limited)",
                "shipping": "/api/shipping (development only)",
                "payroll": "/api/payroll/preview, /api/salaries[/:id[/approve|pay|revert]] (protected)",
                "orders": "/api/orders/:id/return (protected)",
                "debts": "/api/debts/:id/payments (protected)",
            }
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.backend.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "backend": state.backend.name() }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "backend unavailable",
                    "data": { "status": "degraded", "timestamp": now, "backend": state.backend.name() }
                })),
            )
        }
    }
}

/// 302 back to the app root carrying the OAuth outcome as a query parameter
pub(crate) fn app_redirect(app_url: &str, key: &str, value: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, redirect_location(app_url, key, value))]).into_response()
}

fn redirect_location(app_url: &str, key: &str, value: &str) -> String {
    match Url::parse(app_url) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(key, value);
            url.to_string()
        }
        Err(e) => {
            tracing::warn!("APP_URL '{}' is not a valid URL: {}", app_url, e);
            let encoded: String = url::form_urlencoded::Serializer::new(String::new())
                .append_pair(key, value)
                .finish();
            format!("/?{}", encoded)
        }
    }
}
