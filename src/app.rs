use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::backend::{self, Backend};
use crate::config::AppConfig;
use crate::handlers::{protected, public};
use crate::integrations::{http_client, CarrierApi, CarrierClient, FacebookApi, GraphClient, ZaloApi, ZaloClient};
use crate::middleware::{cors_layer, jwt_auth_middleware, rate_limit_middleware, RateLimiter};

/// Shared handler state; every collaborator is swappable for tests
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backend: Arc<dyn Backend>,
    pub facebook: Arc<dyn FacebookApi>,
    pub zalo: Arc<dyn ZaloApi>,
    pub carrier: Arc<dyn CarrierApi>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Production wiring: configured backend plus reqwest clients for each integration
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let backend = backend::connect(&config.backend).await?;
        let client = http_client(config.backend.request_timeout_secs)?;

        Ok(Self {
            facebook: Arc::new(GraphClient::new(client.clone(), &config.facebook)),
            zalo: Arc::new(ZaloClient::new(client.clone(), &config.zalo)),
            carrier: Arc::new(CarrierClient::new(client, &config.shipping.base_url)),
            limiter: Arc::new(RateLimiter::from_config(&config.api)),
            config: Arc::new(config),
            backend,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(oauth_routes())
        .merge(metrics_routes(&state))
        // Protected (JWT)
        .merge(protected_routes(&state));

    if state.config.shipping.enable_dev_proxy {
        tracing::info!("Shipping dev proxy enabled at /api/shipping");
        router = router.route("/api/shipping", post(public::shipping::shipping_proxy));
    }

    let router = router
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(cors_layer(&state.config.security));
    let router = if state.config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };
    router.with_state(state)
}

fn oauth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/facebook/callback", get(public::facebook::facebook_callback))
        .route("/api/zalo/callback", get(public::zalo::zalo_callback))
}

fn metrics_routes(state: &AppState) -> Router<AppState> {
    let router = Router::new().route("/api/facebook/metrics", post(public::facebook::facebook_metrics));
    if state.config.api.enable_rate_limiting {
        router.route_layer(from_fn_with_state(state.limiter.clone(), rate_limit_middleware))
    } else {
        router
    }
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/payroll/preview", post(protected::payroll::preview))
        .route("/api/salaries", post(protected::salaries::create))
        .route("/api/salaries/:id", put(protected::salaries::update))
        .route("/api/salaries/:id/approve", post(protected::salaries::approve))
        .route("/api/salaries/:id/pay", post(protected::salaries::pay))
        .route("/api/salaries/:id/revert", post(protected::salaries::revert))
        .route("/api/orders/:id/return", post(protected::orders::return_order))
        .route("/api/debts/:id/payments", post(protected::debts::record_payment))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
}
