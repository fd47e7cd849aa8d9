use axum::{
    extract::{Query, State},
    response::Response,
    Json,
};
use serde_json::Value;

use super::app_redirect;
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{CallbackParams, MetricsRequest, MetricsService, OAuthService};

/// GET /api/facebook/callback - link the tenant in `state` to the user's Pages
///
/// Always answers with a redirect to the app: `fb_success=<pages linked>` or
/// `fb_error=<message>`. Query problems are caught before any call to Facebook.
pub async fn facebook_callback(State(state): State<AppState>, Query(params): Query<CallbackParams>) -> Response {
    let app_url = &state.config.server.app_url;

    let auth = match params.authorization() {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!("Facebook callback rejected: {}", e);
            return app_redirect(app_url, "fb_error", &e.user_message());
        }
    };

    let service = OAuthService::new(state.backend.clone());
    match service.connect_facebook(state.facebook.as_ref(), &auth).await {
        Ok(count) => app_redirect(app_url, "fb_success", &count.to_string()),
        Err(e) => {
            tracing::error!("Facebook connection for tenant {} failed: {}", auth.tenant_id, e);
            app_redirect(app_url, "fb_error", &e.user_message())
        }
    }
}

/// POST /api/facebook/metrics - video or reel stats fetched with the stored Page token
///
/// ```json
/// { "action": "get_video_stats", "tenant_id": "...", "page_id": "...", "video_id": "..." }
/// ```
pub async fn facebook_metrics(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult<Value> {
    let request: MetricsRequest = serde_json::from_value(body).map_err(|e| {
        tracing::debug!("Invalid metrics request: {}", e);
        ApiError::bad_request("Yêu cầu không hợp lệ: action phải là get_video_stats hoặc get_reel_stats")
    })?;

    let stats = MetricsService::new(state.backend.clone())
        .fetch(state.facebook.as_ref(), &request)
        .await?;
    Ok(ApiResponse::success(stats))
}
