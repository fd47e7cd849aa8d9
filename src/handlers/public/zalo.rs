use axum::{
    extract::{Query, State},
    response::Response,
};

use super::app_redirect;
use crate::app::AppState;
use crate::services::{CallbackParams, OAuthService};

/// GET /api/zalo/callback - link the tenant in `state` to a Zalo Official Account
pub async fn zalo_callback(State(state): State<AppState>, Query(params): Query<CallbackParams>) -> Response {
    let app_url = &state.config.server.app_url;

    let auth = match params.authorization() {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!("Zalo callback rejected: {}", e);
            return app_redirect(app_url, "zalo_error", &e.user_message());
        }
    };

    let service = OAuthService::new(state.backend.clone());
    match service.connect_zalo(state.zalo.as_ref(), &auth, params.oa_id.as_deref()).await {
        Ok(_) => app_redirect(app_url, "zalo_success", "1"),
        Err(e) => {
            tracing::error!("Zalo connection for tenant {} failed: {}", auth.tenant_id, e);
            app_redirect(app_url, "zalo_error", &e.user_message())
        }
    }
}
